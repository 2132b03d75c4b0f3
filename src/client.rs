use easy_error::{Error, ResultExt};
use reqwest::blocking::Client;
use reqwest::Url;
use tracing::{debug, warn};

/// Anything pages and images can be retrieved from.
pub trait PageSource {
    /// Body of a successful GET. A non-success status is reported and yields `None`;
    /// only transport failures are errors.
    fn fetch_bytes(&self, url: &Url) -> Result<Option<Vec<u8>>, Error>;

    /// Same as `fetch_bytes`, decoded as UTF-8 whatever the headers claim.
    fn fetch_text(&self, url: &Url) -> Result<Option<String>, Error> {
        Ok(self
            .fetch_bytes(url)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// A single blocking HTTP session sending a fixed user agent.
pub struct Session {
    client: Client,
}

impl Session {
    pub fn new(user_agent: &str) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .context("Could not build HTTP client")?;
        Ok(Self { client })
    }
}

impl PageSource for Session {
    fn fetch_bytes(&self, url: &Url) -> Result<Option<Vec<u8>>, Error> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .context(format!("Could not retrieve page {url}"))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "failed to get page");
            return Ok(None);
        }

        let body = response.bytes().context(format!("Could not read body of {url}"))?;
        Ok(Some(body.to_vec()))
    }
}

#[cfg(test)]
pub mod testing {
    use super::PageSource;
    use easy_error::Error;
    use reqwest::Url;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory page source that records every requested URL.
    #[derive(Default)]
    pub struct FakeSource {
        pages: HashMap<String, Vec<u8>>,
        pub requests: RefCell<Vec<String>>,
    }

    impl FakeSource {
        pub fn with_page(mut self, url: &str, contents: impl AsRef<[u8]>) -> Self {
            self.pages.insert(url.to_string(), contents.as_ref().to_vec());
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl PageSource for FakeSource {
        fn fetch_bytes(&self, url: &Url) -> Result<Option<Vec<u8>>, Error> {
            self.requests.borrow_mut().push(url.to_string());
            Ok(self.pages.get(url.as_str()).cloned())
        }
    }
}

#[cfg(test)]
use self::testing::FakeSource;

#[test]
fn test_fetch_text_decodes_lossily() {
    let url = Url::parse("https://kobatochan.com/page/").unwrap();
    let source = FakeSource::default().with_page(url.as_str(), b"caf\xc3\xa9 \xff");

    assert_eq!(Some("café \u{fffd}".to_string()), source.fetch_text(&url).unwrap());
    assert_eq!(None, source.fetch_text(&Url::parse("https://kobatochan.com/other/").unwrap()).unwrap());
    assert_eq!(2, source.request_count());
}
