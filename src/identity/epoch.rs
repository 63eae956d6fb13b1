#[cfg(not(test))]
use serde::Deserialize;
use thiserror::Error;

/// How long to wait on the epoch authority before giving up. Callers that
/// abandon the request sooner simply drop the future.
const EPOCH_TIMEOUT_SECS: u64 = 10;

/// Client for the epoch authority: the external source of truth for the
/// monotonically increasing counter that bounds ephemeral key validity.
///
/// The authority is a black box; all we rely on is that the counter it
/// reports never decreases.
pub struct EpochSource {
    client: reqwest::Client,
    url: String,
    horizon: u64,
}

/// The part of the authority's answer we care about.
#[cfg(not(test))]
#[derive(Debug, Deserialize)]
struct EpochSnapshot {
    epoch: u64,
}

#[derive(Debug, Error)]
pub enum EpochError {
    #[error("epoch authority request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl EpochSource {
    /// Build a client for the authority at `url`, granting keys `horizon`
    /// epochs of forward validity.
    pub fn new(url: String, horizon: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(EPOCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url,
            horizon,
        })
    }

    /// The current epoch according to the authority.
    #[cfg(not(test))]
    pub async fn current_epoch(&self) -> Result<u64, EpochError> {
        let snapshot: EpochSnapshot = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(snapshot.epoch)
    }

    /// The current epoch (test version): a fixture, so tests never touch the
    /// network.
    #[cfg(test)]
    pub async fn current_epoch(&self) -> Result<u64, EpochError> {
        let _ = (&self.client, &self.url);
        Ok(Self::TEST_EPOCH)
    }

    #[cfg(test)]
    pub const TEST_EPOCH: u64 = 812;

    /// The last epoch at which a key minted right now should be accepted.
    pub async fn validity_horizon(&self) -> Result<u64, EpochError> {
        Ok(self.current_epoch().await? + self.horizon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn horizon_extends_the_current_epoch() {
        let source = EpochSource::new("http://unused.invalid".to_string(), 2).unwrap();
        assert_eq!(
            source.validity_horizon().await.unwrap(),
            EpochSource::TEST_EPOCH + 2
        );
    }
}
