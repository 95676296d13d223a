use crate::error::PollError;
use crate::models::Poll;
use reqwest::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedMode {
    #[default]
    Live,
    Results,
}

impl EmbedMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EmbedMode::Live => "live",
            EmbedMode::Results => "results",
        }
    }
}

/// Builds the public links a poll card exposes. Independent of voting state.
#[derive(Debug, Clone)]
pub struct SiteLinks {
    base: Url,
}

impl SiteLinks {
    pub fn new(site_url: &str) -> Result<Self, PollError> {
        let base = Url::parse(site_url).map_err(|e| PollError::InvalidUrl(format!("{}: {}", site_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(PollError::InvalidUrl(site_url.to_string()));
        }
        Ok(Self { base })
    }

    fn page(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn results_page(&self) -> String {
        self.page(&["poll-results"]).to_string()
    }

    /// `/poll-results?focus={slug or id}`
    pub fn results_link(&self, poll: &Poll) -> String {
        let mut url = self.page(&["poll-results"]);
        url.query_pairs_mut().append_pair("focus", poll.public_handle());
        url.to_string()
    }

    /// `/embed/poll/{slug or id}?mode=live|results`
    pub fn embed_link(&self, poll: &Poll, mode: EmbedMode) -> String {
        let mut url = self.page(&["embed", "poll", poll.public_handle()]);
        url.query_pairs_mut().append_pair("mode", mode.as_str());
        url.to_string()
    }

    pub fn embed_snippet(&self, poll: &Poll, mode: EmbedMode) -> String {
        format!(
            "<iframe src=\"{}\" width=\"420\" height=\"320\" frameborder=\"0\" scrolling=\"no\"></iframe>",
            self.embed_link(poll, mode).replace('"', "&quot;")
        )
    }
}
