use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use color_eyre::Result;
use dotenv::dotenv;
use sponsor7702_client::config::SponsorConfig;
use sponsor7702_client::controller::AccountController;
use sponsor7702_client::events::{spawn_event_logger, EventBus};
use sponsor7702_client::ledger::rpc::RpcLedger;
use sponsor7702_primitives::abi::erc20::approve_call;
use sponsor7702_primitives::abi::tier_stake::{stake_call, TierStake};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    dotenv().ok();
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "./sponsor-config.json".into());
    let config = SponsorConfig::from_file(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(config.log_level()?)
        .init();

    let signer = PrivateKeySigner::from_str(&env::var("SIGNER_PRIVATE_KEY")?)?;
    let sponsor = PrivateKeySigner::from_str(&env::var("SPONSOR_PRIVATE_KEY")?)?;
    let token = Address::from_str(&env::var("TOKEN_ADDRESS")?)?;
    let stake_contract = Address::from_str(&env::var("STAKE_ADDRESS")?)?;

    let stake_amount = U256::from(100) * U256::from(10).pow(U256::from(18)); // 100 tokens

    let sponsor_address = sponsor.address();
    let rpc_provider = ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(EthereumWallet::from(sponsor))
        .on_http(config.rpc_url()?);
    let ledger = Arc::new(RpcLedger::new(rpc_provider.clone(), sponsor_address));

    let events = EventBus::new(config.event_capacity);
    let logger = spawn_event_logger(events.subscribe());

    let mut controller =
        AccountController::new(config.controller_config()?, ledger, signer, events.clone())?;
    let account = controller.account();

    // approve and stake land together or not at all
    let outcome = controller
        .run(vec![
            approve_call(token, stake_contract, stake_amount),
            stake_call(stake_contract, stake_amount),
        ])
        .await?;

    tracing::info!(
        "stake batch at nonce {} confirmed in {}",
        outcome.batch.nonce,
        outcome.batch.tx_hash
    );

    let stake_info = TierStake::new(stake_contract, rpc_provider)
        .stakeInfo(account)
        .call()
        .await?
        ._0;
    tracing::info!("{} has {} staked", account, stake_info.stakedAmount);

    drop(controller);
    drop(events);
    logger.await?;
    Ok(())
}
