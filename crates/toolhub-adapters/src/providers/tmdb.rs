//! The Movie Database (TMDB) v3.

use serde_json::json;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, TimeoutClass, encode_segment};
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_LANGUAGE: &str = "en-US";

/// TMDB provider context.
pub struct Tmdb {
    key: Credential,
    base_url: String,
}

type Op = Operation<Tmdb>;

impl Tmdb {
    /// GET with the key and the caller's query.  The key travels as a query
    /// parameter and is never logged.
    fn get(&self, path: &str, query: ParamSet) -> RequestDescriptor {
        RequestDescriptor::get(format!("{}{path}", self.base_url))
            .query(query)
            .query_pair("api_key", self.key.expose())
            .timeout(TimeoutClass::Metadata)
    }

    fn item(&self, a: &Args, kind: &str, id_key: &str, suffix: &str, query: ParamSet) -> Result<RequestDescriptor> {
        let id = encode_segment(&a.require_id(id_key)?);
        Ok(self.get(&format!("/{kind}/{id}{suffix}"), query))
    }

    fn media(&self, a: &Args, suffix: &str, query: ParamSet) -> Result<RequestDescriptor> {
        let kind = a.require_str("media_type")?;
        self.item(a, kind, "media_id", suffix, query)
    }
}

fn language() -> Param {
    Param::string("language").default(DEFAULT_LANGUAGE)
}

fn listing(op: Op) -> Op {
    op.param(language()).param(Param::integer("page").default(1))
}

fn media_type(default: Option<&'static str>) -> Param {
    let p = Param::string("media_type").one_of(&["movie", "tv"]);
    match default {
        Some(d) => p.default(d),
        None => p.required(),
    }
}

fn search(op: Op) -> Op {
    listing(op)
        .param(Param::string("query").required())
        .param(Param::boolean("include_adult").default(false))
}

fn discover(op: Op) -> Op {
    listing(op)
        .param(Param::string("sort_by").default("popularity.desc"))
        .param(Param::string("with_genres").describe("Comma-separated genre IDs"))
        .param(Param::number("vote_average_gte"))
        .param(Param::number("vote_average_lte"))
        .param(Param::integer("with_runtime_gte"))
        .param(Param::integer("with_runtime_lte"))
}

/// Range filters use dotted wire names.
fn discover_query(a: &Args) -> ParamSet {
    ParamSet::new()
        .forward_all(a, &["language", "page", "sort_by", "with_genres"])
        .forward_as(a, "vote_average_gte", "vote_average.gte")
        .forward_as(a, "vote_average_lte", "vote_average.lte")
        .forward_as(a, "with_runtime_gte", "with_runtime.gte")
        .forward_as(a, "with_runtime_lte", "with_runtime.lte")
}

fn details(op: Op, id_key: &'static str) -> Op {
    op.param(Param::integer(id_key).required())
        .param(language())
        .param(Param::string("append_to_response").describe("e.g. \"credits,videos\""))
}

fn details_query(a: &Args) -> ParamSet {
    ParamSet::new().forward_all(a, &["language", "append_to_response"])
}

impl Provider for Tmdb {
    const ID: &'static str = "tmdb";
    const ADAPTER_TYPE: AdapterType = AdapterType::Data;
    const ENV_VARS: &'static [&'static str] = &["TMDB_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "TMDB_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            // -- Search --
            search(Op::new("tmdb_search_movies", "Search movies by title"))
                .param(Param::integer("year"))
                .request(|cx, a| {
                    let query = ParamSet::new()
                        .forward_all(a, &["query", "language", "page", "include_adult", "year"]);
                    Ok(cx.get("/search/movie", query))
                }),
            search(Op::new("tmdb_search_tv_shows", "Search TV shows by name"))
                .param(Param::integer("first_air_date_year"))
                .request(|cx, a| {
                    let query = ParamSet::new().forward_all(
                        a,
                        &["query", "language", "page", "include_adult", "first_air_date_year"],
                    );
                    Ok(cx.get("/search/tv", query))
                }),
            search(Op::new("tmdb_search_people", "Search actors and crew"))
                .request(|cx, a| {
                    let query = ParamSet::new()
                        .forward_all(a, &["query", "language", "page", "include_adult"]);
                    Ok(cx.get("/search/person", query))
                }),
            // -- Details --
            details(Op::new("tmdb_get_movie_details", "Movie details"), "movie_id")
                .request(|cx, a| cx.item(a, "movie", "movie_id", "", details_query(a))),
            details(Op::new("tmdb_get_tv_details", "TV show details"), "tv_id")
                .request(|cx, a| cx.item(a, "tv", "tv_id", "", details_query(a))),
            details(Op::new("tmdb_get_person_details", "Person details"), "person_id")
                .request(|cx, a| cx.item(a, "person", "person_id", "", details_query(a))),
            // -- Lists --
            listing(Op::new("tmdb_get_trending", "Trending titles or people"))
                .param(Param::string("media_type").default("movie").one_of(&["all", "movie", "tv", "person"]))
                .param(Param::string("time_window").default("day").one_of(&["day", "week"]))
                .request(|cx, a| {
                    let path = format!(
                        "/trending/{}/{}",
                        a.require_str("media_type")?,
                        a.require_str("time_window")?
                    );
                    Ok(cx.get(&path, ParamSet::new().forward_all(a, &["language", "page"])))
                }),
            listing(Op::new("tmdb_get_popular", "Popular movies or shows"))
                .param(media_type(Some("movie")))
                .param(Param::string("region").describe("ISO 3166-1 code"))
                .request(|cx, a| {
                    let path = format!("/{}/popular", a.require_str("media_type")?);
                    Ok(cx.get(&path, ParamSet::new().forward_all(a, &["language", "page", "region"])))
                }),
            listing(Op::new("tmdb_get_top_rated", "Top rated movies or shows"))
                .param(media_type(Some("movie")))
                .param(Param::string("region"))
                .request(|cx, a| {
                    let path = format!("/{}/top_rated", a.require_str("media_type")?);
                    Ok(cx.get(&path, ParamSet::new().forward_all(a, &["language", "page", "region"])))
                }),
            discover(Op::new("tmdb_discover_movies", "Filter movies by genre, rating and year"))
                .param(Param::integer("year"))
                .param(Param::integer("primary_release_year"))
                .param(Param::string("region"))
                .request(|cx, a| {
                    let query = discover_query(a)
                        .forward_all(a, &["year", "primary_release_year", "region"]);
                    Ok(cx.get("/discover/movie", query))
                }),
            discover(Op::new("tmdb_discover_tv", "Filter TV shows by genre, rating and network"))
                .param(Param::integer("first_air_date_year"))
                .param(Param::string("with_networks"))
                .request(|cx, a| {
                    let query = discover_query(a)
                        .forward_all(a, &["first_air_date_year", "with_networks"]);
                    Ok(cx.get("/discover/tv", query))
                }),
            Op::new("tmdb_get_genres", "Genre IDs and names")
                .param(media_type(Some("movie")))
                .param(language())
                .request(|cx, a| {
                    let path = format!("/genre/{}/list", a.require_str("media_type")?);
                    Ok(cx.get(&path, ParamSet::new().forward(a, "language")))
                }),
            // -- Per title --
            Op::new("tmdb_get_movie_credits", "Cast and crew of a movie")
                .param(Param::integer("movie_id").required())
                .param(language())
                .request(|cx, a| {
                    cx.item(a, "movie", "movie_id", "/credits", ParamSet::new().forward(a, "language"))
                }),
            Op::new("tmdb_get_tv_credits", "Cast and crew of a TV show")
                .param(Param::integer("tv_id").required())
                .param(language())
                .request(|cx, a| {
                    cx.item(a, "tv", "tv_id", "/credits", ParamSet::new().forward(a, "language"))
                }),
            listing(Op::new("tmdb_get_recommendations", "Titles similar to a movie or show"))
                .param(media_type(None))
                .param(Param::integer("media_id").required())
                .request(|cx, a| {
                    cx.media(a, "/recommendations", ParamSet::new().forward_all(a, &["language", "page"]))
                }),
            Op::new("tmdb_get_streaming_providers", "Streaming, rental and purchase options by country")
                .param(media_type(None))
                .param(Param::integer("media_id").required())
                .request(|cx, a| cx.media(a, "/watch/providers", ParamSet::new())),
        ]
    }
}
