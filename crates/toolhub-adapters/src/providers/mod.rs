//! Provider adapters.
//!
//! One module per third-party API.  Each defines a context type holding the
//! resolved credentials and base URL, and implements
//! [`Provider`](crate::operation::Provider) with its operation table.

pub mod abstract_api;
pub mod airtable;
pub mod alphavantage;
pub mod asana;
pub mod brave;
pub mod claude;
pub mod clickup;
pub mod coingecko;
pub mod context7;
pub mod deepl;
pub mod gemini;
pub mod gitlab;
pub mod huggingface;
pub mod linear;
pub mod mailchimp;
pub mod newsapi;
pub mod openai;
pub mod pdfco;
pub mod pinecone;
pub mod sentry;
pub mod stripe;
pub mod tmdb;
pub mod todoist;
pub mod twilio;

pub use abstract_api::AbstractApi;
pub use airtable::Airtable;
pub use alphavantage::AlphaVantage;
pub use asana::Asana;
pub use brave::Brave;
pub use claude::Claude;
pub use clickup::ClickUp;
pub use coingecko::CoinGecko;
pub use context7::Context7;
pub use deepl::DeepL;
pub use gemini::Gemini;
pub use gitlab::GitLab;
pub use huggingface::HuggingFace;
pub use linear::Linear;
pub use mailchimp::Mailchimp;
pub use newsapi::NewsApi;
pub use openai::OpenAi;
pub use pdfco::PdfCo;
pub use pinecone::Pinecone;
pub use sentry::Sentry;
pub use stripe::Stripe;
pub use tmdb::Tmdb;
pub use todoist::Todoist;
pub use twilio::Twilio;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::ProviderSettings;
    use crate::credentials::MapEnv;
    use crate::error::Result;
    use crate::operation::{Provider, ServiceAdapter};
    use crate::transport::HttpTransport;

    pub fn try_adapter<P: Provider>(vars: &[(&str, &str)]) -> Result<ServiceAdapter<P>> {
        let env = vars
            .iter()
            .fold(MapEnv::new(), |env, (k, v)| env.with(k, v));
        ServiceAdapter::from_env(&env, &ProviderSettings::default(), HttpTransport::new())
    }

    pub fn adapter<P: Provider>(vars: &[(&str, &str)]) -> ServiceAdapter<P> {
        try_adapter(vars).unwrap()
    }
}
