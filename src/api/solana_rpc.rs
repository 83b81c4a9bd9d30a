use crate::execution::BalanceSource;
use crate::models::{WalletBalance, USDC_MINT_ADDRESS};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// USDC-equivalent token minted by the Orca devnet pools
const DEVNET_QUOTE_MINT_ADDRESS: &str = "EmXq3Ni9gfudTiyNKzzYvpnQqnJEMRw2ttnVXoJXjLo1";
const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Solana cluster the wallet operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    Devnet,
    MainnetBeta,
}

impl Cluster {
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
        }
    }

    /// Mint of the quote asset holdings on this cluster
    pub fn quote_mint(&self) -> &'static str {
        match self {
            Cluster::Devnet => DEVNET_QUOTE_MINT_ADDRESS,
            Cluster::MainnetBeta => USDC_MINT_ADDRESS,
        }
    }
}

/// Balance reader over Solana JSON-RPC
#[derive(Clone)]
pub struct SolanaRpcClient {
    client: Client,
    rpc_url: String,
    owner: String,
    quote_mint: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl SolanaRpcClient {
    /// # Arguments
    /// * `cluster` - Cluster whose public RPC endpoint and quote mint are used
    /// * `owner` - Base58 wallet public key
    pub fn new(cluster: Cluster, owner: impl Into<String>) -> Self {
        Self::with_rpc_url(cluster.rpc_url(), cluster.quote_mint(), owner)
    }

    pub fn with_rpc_url(
        rpc_url: impl Into<String>,
        quote_mint: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            client: super::http_client(),
            rpc_url: rpc_url.into(),
            owner: owner.into(),
            quote_mint: quote_mint.into(),
        }
    }

    /// Native SOL and quote-token balances in one batched request
    pub async fn get_balances(&self) -> Result<WalletBalance> {
        let batch = json!([
            {
                "jsonrpc": "2.0",
                "id": 0,
                "method": "getBalance",
                "params": [self.owner],
            },
            {
                "jsonrpc": "2.0",
                "id": 1,
                "method": "getTokenAccountsByOwner",
                "params": [
                    self.owner,
                    { "mint": self.quote_mint },
                    { "encoding": "jsonParsed" },
                ],
            },
        ]);

        let responses: Vec<RpcResponse> = self
            .client
            .post(&self.rpc_url)
            .json(&batch)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut base = None;
        let mut quote = None;

        for response in responses {
            if let Some(error) = response.error {
                return Err(format!("RPC request {} failed: {}", response.id, error).into());
            }
            let result = response.result.ok_or("RPC response missing result")?;

            match response.id {
                0 => {
                    let lamports = result
                        .pointer("/value")
                        .and_then(Value::as_u64)
                        .ok_or("getBalance response missing value")?;
                    base = Some(lamports as f64 / LAMPORTS_PER_SOL);
                }
                1 => {
                    // No token account yet means a zero balance
                    quote = Some(
                        result
                            .pointer("/value/0/account/data/parsed/info/tokenAmount/uiAmount")
                            .and_then(Value::as_f64)
                            .unwrap_or(0.0),
                    );
                }
                other => {
                    tracing::debug!("Ignoring unexpected RPC response id {}", other);
                }
            }
        }

        Ok(WalletBalance {
            base: base.ok_or("missing getBalance response")?,
            quote: quote.ok_or("missing getTokenAccountsByOwner response")?,
        })
    }
}

#[async_trait]
impl BalanceSource for SolanaRpcClient {
    async fn fetch(&self) -> Result<WalletBalance> {
        self.get_balances().await
    }
}
