//! Alpha Vantage market data.
//!
//! One endpoint; the `function` query parameter selects the dataset.

use serde_json::Value;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::{AdapterError, Result};
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param};
use crate::payload::ParamSet;
use crate::request::RequestDescriptor;
use crate::traits::AdapterType;
use crate::transport::ResponseEnvelope;

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

/// Alpha Vantage provider context.
pub struct AlphaVantage {
    key: Credential,
    base_url: String,
}

type Op = Operation<AlphaVantage>;

impl AlphaVantage {
    fn query(&self, function: &str, params: ParamSet) -> RequestDescriptor {
        RequestDescriptor::get(&self.base_url).query(
            ParamSet::new()
                .set("function", function)
                .extend(params)
                .set("apikey", self.key.expose()),
        )
    }
}

/// Alpha Vantage reports bad symbols and invalid calls with HTTP 200 and an
/// `Error Message` field.
fn checked(a: &Args, r: ResponseEnvelope) -> Result<Value> {
    let body = r.json()?;
    if body.get("Error Message").is_some() {
        return Err(AdapterError::Upstream {
            tool_name: a.tool().to_string(),
            status: r.status,
            body: body.to_string(),
        });
    }
    Ok(body)
}

fn symbol() -> Param {
    Param::string("symbol").required().describe("Ticker, e.g. IBM")
}

fn outputsize() -> Param {
    Param::string("outputsize")
        .default("compact")
        .one_of(&["compact", "full"])
}

/// Datasets that take only a symbol, keyed by tool name.
const SYMBOL_FUNCTIONS: &[(&str, &str)] = &[
    ("alphavantage_get_stock_quote", "GLOBAL_QUOTE"),
    ("alphavantage_get_weekly_data", "TIME_SERIES_WEEKLY"),
    ("alphavantage_get_monthly_data", "TIME_SERIES_MONTHLY"),
    ("alphavantage_get_company_overview", "OVERVIEW"),
    ("alphavantage_get_earnings", "EARNINGS"),
];

/// Operation taking only a symbol; the dataset comes from [`SYMBOL_FUNCTIONS`].
fn by_symbol(name: &'static str, description: &'static str) -> Op {
    Op::new(name, description)
        .param(symbol())
        .request(|cx, a| {
            let function = SYMBOL_FUNCTIONS
                .iter()
                .find(|(tool, _)| *tool == a.tool())
                .map(|(_, f)| *f)
                .ok_or_else(|| AdapterError::Internal(format!("no dataset for `{}`", a.tool())))?;
            Ok(cx.query(function, ParamSet::new().forward(a, "symbol")))
        })
        .shape(checked)
}

impl Provider for AlphaVantage {
    const ID: &'static str = "alphavantage";
    const ADAPTER_TYPE: AdapterType = AdapterType::Data;
    const ENV_VARS: &'static [&'static str] = &["ALPHAVANTAGE_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "ALPHAVANTAGE_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            by_symbol("alphavantage_get_stock_quote", "Latest price and volume"),
            Op::new("alphavantage_get_intraday_data", "Intraday OHLCV time series")
                .param(symbol())
                .param(
                    Param::string("interval")
                        .default("5min")
                        .one_of(&["1min", "5min", "15min", "30min", "60min"]),
                )
                .param(outputsize())
                .request(|cx, a| {
                    Ok(cx.query(
                        "TIME_SERIES_INTRADAY",
                        ParamSet::new().forward_all(a, &["symbol", "interval", "outputsize"]),
                    ))
                })
                .shape(checked),
            Op::new("alphavantage_get_daily_data", "Daily OHLCV time series")
                .param(symbol())
                .param(outputsize())
                .request(|cx, a| {
                    Ok(cx.query(
                        "TIME_SERIES_DAILY",
                        ParamSet::new().forward_all(a, &["symbol", "outputsize"]),
                    ))
                })
                .shape(checked),
            by_symbol("alphavantage_get_weekly_data", "Weekly OHLCV time series"),
            by_symbol("alphavantage_get_monthly_data", "Monthly OHLCV time series"),
            Op::new("alphavantage_search_symbol", "Find tickers matching keywords")
                .param(Param::string("keywords").required())
                .request(|cx, a| {
                    Ok(cx.query("SYMBOL_SEARCH", ParamSet::new().forward(a, "keywords")))
                })
                .shape(checked),
            Op::new(
                "alphavantage_get_technical_indicator",
                "Technical indicator series such as SMA, EMA or RSI",
            )
            .param(Param::string("indicator").required().describe("e.g. sma, ema, rsi, macd"))
            .param(symbol())
            .param(Param::string("interval").default("daily"))
            .param(Param::integer("time_period").default(14))
            .param(
                Param::string("series_type")
                    .default("close")
                    .one_of(&["close", "open", "high", "low"]),
            )
            .request(|cx, a| {
                let function = a.require_str("indicator")?.to_uppercase();
                Ok(cx.query(
                    &function,
                    ParamSet::new()
                        .forward_all(a, &["symbol", "interval", "time_period", "series_type"]),
                ))
            })
            .shape(checked),
            Op::new("alphavantage_get_forex_rate", "Realtime exchange rate between currencies")
                .param(Param::string("from_currency").required())
                .param(Param::string("to_currency").required())
                .request(|cx, a| {
                    Ok(cx.query(
                        "CURRENCY_EXCHANGE_RATE",
                        ParamSet::new().forward_all(a, &["from_currency", "to_currency"]),
                    ))
                })
                .shape(checked),
            Op::new("alphavantage_get_crypto_price", "Realtime rate of a cryptocurrency")
                .param(Param::string("symbol").required().describe("e.g. BTC"))
                .param(Param::string("market").default("USD"))
                .request(|cx, a| {
                    Ok(cx.query(
                        "CURRENCY_EXCHANGE_RATE",
                        ParamSet::new()
                            .forward_as(a, "symbol", "from_currency")
                            .forward_as(a, "market", "to_currency"),
                    ))
                })
                .shape(checked),
            by_symbol(
                "alphavantage_get_company_overview",
                "Company fundamentals and ratios",
            ),
            by_symbol("alphavantage_get_earnings", "Annual and quarterly earnings"),
            Op::new("alphavantage_get_market_sentiment", "News articles with sentiment scores")
                .param(Param::string("tickers").describe("Comma-separated tickers"))
                .param(Param::string("topics"))
                .param(Param::string("time_from").describe("YYYYMMDDTHHMM"))
                .param(Param::string("time_to"))
                .param(
                    Param::string("sort")
                        .default("LATEST")
                        .one_of(&["LATEST", "EARLIEST", "RELEVANCE"]),
                )
                .param(Param::integer("limit").default(50))
                .request(|cx, a| {
                    Ok(cx.query(
                        "NEWS_SENTIMENT",
                        ParamSet::new().forward_all(
                            a,
                            &["tickers", "topics", "time_from", "time_to", "sort", "limit"],
                        ),
                    ))
                })
                .shape(checked),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ServiceAdapter;
    use crate::providers::test_support::adapter;
    use serde_json::json;

    fn av() -> ServiceAdapter<AlphaVantage> {
        adapter(&[("ALPHAVANTAGE_API_KEY", "demo")])
    }

    #[test]
    fn function_selects_dataset() {
        let d = &av()
            .prepare("alphavantage_get_monthly_data", json!({"symbol": "IBM"}))
            .unwrap()[0];
        assert_eq!(d.query_value("function"), Some("TIME_SERIES_MONTHLY"));
        assert_eq!(d.query_value("apikey"), Some("demo"));
    }

    #[test]
    fn indicator_is_uppercased() {
        let d = &av()
            .prepare(
                "alphavantage_get_technical_indicator",
                json!({"indicator": "rsi", "symbol": "IBM"}),
            )
            .unwrap()[0];
        assert_eq!(d.query_value("function"), Some("RSI"));
        assert_eq!(d.query_value("time_period"), Some("14"));
    }

    #[test]
    fn crypto_maps_to_exchange_rate_fields() {
        let d = &av()
            .prepare("alphavantage_get_crypto_price", json!({"symbol": "BTC"}))
            .unwrap()[0];
        assert_eq!(d.query_value("from_currency"), Some("BTC"));
        assert_eq!(d.query_value("to_currency"), Some("USD"));
    }

    #[test]
    fn error_message_body_is_an_upstream_error() {
        let a = Args::from_value("alphavantage_get_stock_quote", json!({})).unwrap();
        let r = ResponseEnvelope::from_json(&json!({"Error Message": "Invalid API call"}));
        let err = checked(&a, r).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
    }
}
