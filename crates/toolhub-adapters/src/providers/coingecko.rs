//! CoinGecko market data (demo API).

use serde_json::json;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::Param;
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, encode_segment};
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko provider context.
pub struct CoinGecko {
    key: Credential,
    base_url: String,
}

type Op = Operation<CoinGecko>;

impl CoinGecko {
    fn get(&self, path: &str) -> RequestDescriptor {
        RequestDescriptor::get(format!("{}{path}", self.base_url))
            .secret_header("x-cg-demo-api-key", self.key.expose())
    }
}

fn flag(name: &'static str, default: bool) -> Param {
    Param::boolean(name).default(default)
}

fn paging(op: Op) -> Op {
    op.param(Param::integer("per_page").default(100).describe("1-250"))
        .param(Param::integer("page").default(1))
}

impl Provider for CoinGecko {
    const ID: &'static str = "coingecko";
    const ADAPTER_TYPE: AdapterType = AdapterType::Data;
    const ENV_VARS: &'static [&'static str] = &["COINGECKO_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "COINGECKO_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            Op::new("coingecko_get_coin_price", "Current price of coins in one or more currencies")
                .param(Param::string("ids").required().describe("Comma-separated coin IDs"))
                .param(Param::string("vs_currencies").default("usd"))
                .param(flag("include_market_cap", false))
                .param(flag("include_24hr_vol", false))
                .param(flag("include_24hr_change", false))
                .param(flag("include_last_updated_at", false))
                .request(|cx, a| {
                    Ok(cx.get("/simple/price").query(ParamSet::new().forward_all(
                        a,
                        &[
                            "ids",
                            "vs_currencies",
                            "include_market_cap",
                            "include_24hr_vol",
                            "include_24hr_change",
                            "include_last_updated_at",
                        ],
                    )))
                }),
            Op::new("coingecko_get_coin_details", "Detailed information for one coin")
                .param(Param::string("coin_id").required())
                .param(flag("localization", false))
                .param(flag("tickers", false))
                .param(flag("market_data", true))
                .param(flag("community_data", false))
                .param(flag("developer_data", false))
                .param(flag("sparkline", false))
                .request(|cx, a| {
                    let path = format!("/coins/{}", encode_segment(a.require_str("coin_id")?));
                    Ok(cx.get(&path).query(ParamSet::new().forward_all(
                        a,
                        &[
                            "localization",
                            "tickers",
                            "market_data",
                            "community_data",
                            "developer_data",
                            "sparkline",
                        ],
                    )))
                }),
            Op::new("coingecko_get_coin_market_chart", "Historical price, market cap and volume")
                .param(Param::string("coin_id").required())
                .param(Param::string("vs_currency").default("usd"))
                .param(Param::string("days").default("7").describe("1, 7, 14, 30, 90, 180, 365 or max"))
                .param(Param::string("interval").describe("daily; chosen automatically when omitted"))
                .request(|cx, a| {
                    let path = format!(
                        "/coins/{}/market_chart",
                        encode_segment(a.require_str("coin_id")?)
                    );
                    Ok(cx
                        .get(&path)
                        .query(ParamSet::new().forward_all(a, &["vs_currency", "days", "interval"])))
                }),
            Op::new("coingecko_search_coins", "Search coins, exchanges and categories")
                .param(Param::string("query").required())
                .request(|cx, a| Ok(cx.get("/search").query(ParamSet::new().forward(a, "query")))),
            Op::new("coingecko_get_trending_coins", "Trending searches over the last 24 hours")
                .request(|cx, _| Ok(cx.get("/search/trending"))),
            paging(Op::new("coingecko_get_top_coins", "Top coins by market cap with market data"))
                .param(Param::string("vs_currency").default("usd"))
                .param(
                    Param::string("order")
                        .default("market_cap_desc")
                        .one_of(&["market_cap_desc", "volume_desc", "id_asc", "id_desc"]),
                )
                .param(flag("sparkline", false))
                .param(Param::string("price_change_percentage").describe("e.g. 1h,24h,7d"))
                .request(|cx, a| {
                    Ok(cx.get("/coins/markets").query(ParamSet::new().forward_all(
                        a,
                        &[
                            "vs_currency",
                            "order",
                            "per_page",
                            "page",
                            "sparkline",
                            "price_change_percentage",
                        ],
                    )))
                }),
            Op::new("coingecko_list_supported_coins", "Every supported coin id, symbol and name")
                .param(flag("include_platform", false))
                .request(|cx, a| {
                    Ok(cx
                        .get("/coins/list")
                        .query(ParamSet::new().forward(a, "include_platform")))
                }),
            Op::new("coingecko_get_global_market_data", "Global market statistics")
                .request(|cx, _| Ok(cx.get("/global"))),
            Op::new("coingecko_get_exchange_info", "Exchange details")
                .param(Param::string("exchange_id").required())
                .request(|cx, a| {
                    Ok(cx.get(&format!(
                        "/exchanges/{}",
                        encode_segment(a.require_str("exchange_id")?)
                    )))
                }),
            paging(Op::new("coingecko_list_exchanges", "Exchanges ranked by volume")).request(|cx, a| {
                Ok(cx
                    .get("/exchanges")
                    .query(ParamSet::new().forward_all(a, &["per_page", "page"])))
            }),
            Op::new("coingecko_get_coin_categories", "Coin categories with market data")
                .param(Param::string("order").default("market_cap_desc"))
                .request(|cx, a| {
                    Ok(cx
                        .get("/coins/categories")
                        .query(ParamSet::new().forward(a, "order")))
                }),
            Op::new("coingecko_get_nft_data", "NFT collection data")
                .param(Param::string("nft_id").required())
                .request(|cx, a| {
                    Ok(cx.get(&format!("/nfts/{}", encode_segment(a.require_str("nft_id")?))))
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::{adapter, try_adapter};

    #[test]
    fn key_is_required_up_front() {
        assert!(try_adapter::<CoinGecko>(&[]).is_err());
    }

    #[test]
    fn price_renders_boolean_flags() {
        let d = &adapter::<CoinGecko>(&[("COINGECKO_API_KEY", "cg")])
            .prepare("coingecko_get_coin_price", json!({"ids": "bitcoin", "include_24hr_change": true}))
            .unwrap()[0];
        assert_eq!(d.url, "https://api.coingecko.com/api/v3/simple/price");
        assert_eq!(d.query_value("vs_currencies"), Some("usd"));
        assert_eq!(d.query_value("include_24hr_change"), Some("true"));
        assert_eq!(d.query_value("include_market_cap"), Some("false"));
        assert_eq!(d.header_value("x-cg-demo-api-key"), Some("cg"));
    }

    #[test]
    fn market_chart_omits_interval() {
        let d = &adapter::<CoinGecko>(&[("COINGECKO_API_KEY", "cg")])
            .prepare("coingecko_get_coin_market_chart", json!({"coin_id": "ethereum"}))
            .unwrap()[0];
        assert!(d.url.ends_with("/coins/ethereum/market_chart"));
        assert_eq!(d.query_value("days"), Some("7"));
        assert!(d.query_value("interval").is_none());
    }
}
