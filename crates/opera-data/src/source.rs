//! Staker information pulled from the STI contract.
//!
//! The contract maps a validator id to a configuration URL; the JSON
//! document behind that URL carries the actual metadata.

use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use async_trait::async_trait;
use eyre::{Context, Result};

use crate::traits::StakerInfoSource;
use crate::types::StakerInfo;

alloy::sol! {
    #[sol(rpc)]
    interface IStakerInfo {
        function getInfo(uint256 stakerID) external view returns (string info);
    }
}

/// Timeout of the configuration document download.
const CONFIG_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads staker information through an Alloy provider.
pub struct RpcStakerSource<P> {
    provider: P,
    sti_contract: Address,
    http: reqwest::Client,
}

impl<P> RpcStakerSource<P>
where
    P: Provider + Clone + 'static,
{
    /// Creates a source reading from the STI contract at `sti_contract`.
    ///
    /// # Errors
    /// Returns error if the HTTP client can not be built.
    pub fn new(provider: P, sti_contract: Address) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(CONFIG_DOWNLOAD_TIMEOUT)
            .build()
            .wrap_err("failed to build HTTP client")?;

        Ok(Self {
            provider,
            sti_contract,
            http,
        })
    }

    /// Tests RPC connectivity via `eth_blockNumber`.
    ///
    /// # Errors
    /// Returns error if the node can not be reached.
    #[tracing::instrument(skip(self))]
    pub async fn check_connectivity(&self) -> Result<u64> {
        let block_number = self
            .provider
            .get_block_number()
            .await
            .wrap_err("failed to test RPC connectivity with eth_blockNumber")?;

        tracing::info!(latest_block = block_number, "RPC connection successful");
        Ok(block_number)
    }

    async fn download_config(&self, url: &str) -> Result<StakerInfo> {
        let info = self
            .http
            .get(url)
            .send()
            .await
            .wrap_err_with(|| format!("failed to download staker config from {}", url))?
            .error_for_status()
            .wrap_err_with(|| format!("staker config request to {} rejected", url))?
            .json::<StakerInfo>()
            .await
            .wrap_err_with(|| format!("malformed staker config at {}", url))?;
        Ok(info)
    }
}

/// True for configuration URLs the source is willing to download.
fn is_config_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

#[async_trait]
impl<P> StakerInfoSource for RpcStakerSource<P>
where
    P: Provider + Clone + 'static,
{
    #[tracing::instrument(skip(self), fields(staker_id = %id))]
    async fn staker_info(&self, id: U256) -> Result<Option<StakerInfo>> {
        let sti = IStakerInfo::new(self.sti_contract, self.provider.clone());
        let url = sti
            .getInfo(id)
            .call()
            .await
            .wrap_err_with(|| format!("failed to read STI record of staker {}", id))?
            .info;

        let url = url.trim();
        if url.is_empty() {
            tracing::debug!("staker has no published info");
            return Ok(None);
        }
        if !is_config_url(url) {
            tracing::debug!(url, "staker config url not usable");
            return Ok(None);
        }

        let info = self.download_config(url).await?;
        Ok(Some(info).filter(|info| !info.is_empty()))
    }
}
