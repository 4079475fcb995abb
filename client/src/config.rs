use anchor_client::Cluster;
use anyhow::{format_err, Result};
use configparser::ini::Ini;
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    pubkey::Pubkey,
};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::ido_pool::FIRST_DEPOSIT_AMOUNT;
use crate::submitter::SubmissionMode;

pub mod mainnet_ido_program {
    use anchor_lang::prelude::declare_id;
    declare_id!("GrAkKfEpTKQuVHG2Y97Y2FF4i7y7Q5AHLK94JBy7Y5yv");
}

pub mod devnet_ido_program {
    use anchor_lang::prelude::declare_id;
    declare_id!("65aMavjMw3EhmWKVCkGn1Uj2SqZ3XY4coJhYM1BVJTHw");
}

pub mod localhost_ido_program {
    use anchor_lang::prelude::declare_id;
    declare_id!("51AJGMBv8DkxEpCTkitMWzsR3yn8hc5TbW3dHk6UyJsw");
}

pub mod ido_pool_account {
    use anchor_lang::prelude::declare_id;
    declare_id!("Ax38AxYCG4WUUXmYrySaXXTGAcjzMGRai4Lc8mW8H1UU");
}

pub mod localhost_ido_pool_account {
    use anchor_lang::prelude::declare_id;
    declare_id!("AVELVUQsZQJXRvNnSvHBmQtL35cv84FeJGbaot6GiBNd");
}

/// Reference USDC mint accepted by the pool.
pub mod usdc_mint {
    use anchor_lang::prelude::declare_id;
    declare_id!("B3QNZAzzCopug5veJ5r8uKT4q4kyBEUmEGWg7cECHsJp");
}

pub const DEFAULT_NETWORK: &str = "devnet";

/// One deployment environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Table key, e.g. `devnet`.
    pub key: String,
    pub label: String,
    pub http_url: String,
    pub ws_url: String,
    pub explorer_cluster_suffix: String,
    pub ido_program: Pubkey,
    pub ido_pool: Pubkey,
    pub usdc_mint: Pubkey,
}

impl NetworkConfig {
    fn from_cluster(key: &str, label: &str, cluster: Cluster, suffix: &str) -> Self {
        let (ido_program, ido_pool) = match cluster {
            Cluster::Mainnet => (mainnet_ido_program::id(), ido_pool_account::id()),
            Cluster::Localnet => (localhost_ido_program::id(), localhost_ido_pool_account::id()),
            _ => (devnet_ido_program::id(), ido_pool_account::id()),
        };
        NetworkConfig {
            key: key.to_string(),
            label: label.to_string(),
            http_url: cluster.url().to_string(),
            ws_url: cluster.ws_url().to_string(),
            explorer_cluster_suffix: suffix.to_string(),
            ido_program,
            ido_pool,
            usdc_mint: usdc_mint::id(),
        }
    }

    pub fn explorer_tx_url(&self, signature: &str) -> String {
        if self.explorer_cluster_suffix.is_empty() {
            format!("https://explorer.solana.com/tx/{}", signature)
        } else {
            format!(
                "https://explorer.solana.com/tx/{}?cluster={}",
                signature, self.explorer_cluster_suffix
            )
        }
    }
}

/// Built-in environment table, keyed by network name.
pub fn networks() -> BTreeMap<String, NetworkConfig> {
    [
        NetworkConfig::from_cluster("mainnet", "Mainnet Beta", Cluster::Mainnet, ""),
        NetworkConfig::from_cluster("devnet", "Devnet", Cluster::Devnet, "devnet"),
        NetworkConfig::from_cluster("localhost", "Localhost", Cluster::Localnet, "localhost"),
    ]
    .into_iter()
    .map(|network| (network.key.clone(), network))
    .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub payer_path: String,
    pub network: String,
    pub networks: BTreeMap<String, NetworkConfig>,
    pub submission_mode: SubmissionMode,
    pub deposit_amount: u64,
    pub commitment: CommitmentConfig,
}

impl ClientConfig {
    pub fn network_config(&self, key: &str) -> Result<NetworkConfig> {
        self.networks
            .get(key)
            .cloned()
            .ok_or_else(|| format_err!("unknown network {}", key))
    }

    pub fn selected_network(&self) -> Result<NetworkConfig> {
        self.network_config(&self.network)
    }
}

pub fn load_cfg(client_config: &str) -> Result<ClientConfig> {
    let mut config = Ini::new();
    config
        .load(client_config)
        .map_err(|e| format_err!("failed to load {}: {}", client_config, e))?;
    parse_cfg(&config)
}

pub fn parse_cfg(config: &Ini) -> Result<ClientConfig> {
    let payer_path = config
        .get("Global", "payer_path")
        .filter(|path| !path.is_empty())
        .ok_or_else(|| format_err!("payer_path must not be empty"))?;

    let network = config
        .get("Global", "network")
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| DEFAULT_NETWORK.to_string());

    let submission_mode = match config.get("Global", "submission_mode") {
        Some(mode) => SubmissionMode::from_str(&mode)?,
        None => SubmissionMode::default(),
    };

    let deposit_amount = config
        .getuint("Global", "deposit_amount")
        .map_err(|e| format_err!("deposit_amount: {}", e))?
        .unwrap_or(FIRST_DEPOSIT_AMOUNT);
    if deposit_amount == 0 {
        return Err(format_err!("deposit_amount must be positive"));
    }

    let commitment = match config.get("Global", "commitment") {
        Some(level) => CommitmentConfig {
            commitment: CommitmentLevel::from_str(&level)
                .map_err(|_| format_err!("invalid commitment {}", level))?,
        },
        None => CommitmentConfig::confirmed(),
    };

    let mut networks = networks();
    for (key, network) in networks.iter_mut() {
        apply_overrides(config, key, network)?;
    }
    if !networks.contains_key(&network) {
        return Err(format_err!("unknown network {}", network));
    }

    Ok(ClientConfig {
        payer_path,
        network,
        networks,
        submission_mode,
        deposit_amount,
        commitment,
    })
}

fn apply_overrides(config: &Ini, section: &str, network: &mut NetworkConfig) -> Result<()> {
    if let Some(http_url) = config.get(section, "http_url") {
        network.http_url = http_url;
    }
    if let Some(ws_url) = config.get(section, "ws_url") {
        network.ws_url = ws_url;
    }
    for (key, field) in [
        ("program_id", &mut network.ido_program),
        ("pool", &mut network.ido_pool),
        ("usdc_mint", &mut network.usdc_mint),
    ] {
        if let Some(value) = config.get(section, key) {
            *field = Pubkey::from_str(&value)
                .map_err(|_| format_err!("[{}] {} is not a valid address", section, key))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ini(text: &str) -> Ini {
        let mut config = Ini::new();
        config.read(text.to_string()).unwrap();
        config
    }

    #[test]
    fn defaults_fill_missing_global_keys() {
        let config = parse_cfg(&ini("[Global]\npayer_path = id.json\n")).unwrap();
        assert_eq!(config.network, DEFAULT_NETWORK);
        assert_eq!(config.deposit_amount, FIRST_DEPOSIT_AMOUNT);
        assert_eq!(config.submission_mode, SubmissionMode::BestEffort);
        assert_eq!(config.commitment, CommitmentConfig::confirmed());
        let devnet = config.selected_network().unwrap();
        assert_eq!(devnet.label, "Devnet");
        assert_eq!(devnet.ido_program, devnet_ido_program::id());
        assert_eq!(devnet.usdc_mint, usdc_mint::id());
    }

    #[test]
    fn missing_payer_path_is_rejected() {
        assert!(parse_cfg(&ini("[Global]\nnetwork = devnet\n")).is_err());
    }

    #[test]
    fn unknown_network_is_rejected() {
        assert!(parse_cfg(&ini("[Global]\npayer_path = id.json\nnetwork = testnet\n")).is_err());
    }

    #[test]
    fn network_sections_override_table_entries() {
        let pool = Pubkey::new_unique();
        let text = format!(
            "[Global]\npayer_path = id.json\nnetwork = localhost\nsubmission_mode = strict\n\
             [localhost]\nhttp_url = http://127.0.0.1:9999\npool = {}\n",
            pool
        );
        let config = parse_cfg(&ini(&text)).unwrap();
        let localhost = config.selected_network().unwrap();
        assert_eq!(localhost.http_url, "http://127.0.0.1:9999");
        assert_eq!(localhost.ido_pool, pool);
        assert_eq!(localhost.ido_program, localhost_ido_program::id());
        assert_eq!(config.submission_mode, SubmissionMode::Strict);
        // Other networks are untouched.
        assert_eq!(
            config.network_config("mainnet").unwrap().ido_pool,
            ido_pool_account::id()
        );
    }

    #[test]
    fn explorer_link_carries_cluster_suffix() {
        let table = networks();
        assert_eq!(
            table["devnet"].explorer_tx_url("abc"),
            "https://explorer.solana.com/tx/abc?cluster=devnet"
        );
        assert_eq!(
            table["mainnet"].explorer_tx_url("abc"),
            "https://explorer.solana.com/tx/abc"
        );
    }
}
