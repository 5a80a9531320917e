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
use sponsor7702_primitives::abi::erc20::{mint_call, transfer_call, MockERC20};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Load environment variables from the `.env` file
    dotenv().ok();
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "./sponsor-config.json".into());
    let config = SponsorConfig::from_file(&config_path)?;

    // setup tracing for client execution
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(config.log_level()?)
        .init();

    let signer = PrivateKeySigner::from_str(&env::var("SIGNER_PRIVATE_KEY")?)?; // account owner
    let sponsor = PrivateKeySigner::from_str(&env::var("SPONSOR_PRIVATE_KEY")?)?; // pays gas
    let token = Address::from_str(&env::var("TOKEN_ADDRESS")?)?;
    let recipient = Address::from_str(&env::var("RECIPIENT_ADDRESS")?)?;

    let mint_amount = U256::from(1000) * U256::from(10).pow(U256::from(18)); // 1000 tokens
    let transfer_amount = U256::from(100) * U256::from(10).pow(U256::from(18)); // 100 tokens

    // build provider, the sponsor wallet signs every transaction
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
    tracing::info!("sponsor {} acting for {}", sponsor_address, account);

    let outcome = controller
        .run(vec![
            mint_call(token, account, mint_amount),
            transfer_call(token, recipient, transfer_amount),
        ])
        .await?;

    tracing::info!(
        "batch at nonce {} confirmed in {} (gas used {})",
        outcome.batch.nonce,
        outcome.batch.tx_hash,
        outcome.batch.gas_used
    );

    let token_contract = MockERC20::new(token, rpc_provider);
    let account_balance = token_contract.balanceOf(account).call().await?._0;
    let recipient_balance = token_contract.balanceOf(recipient).call().await?._0;
    tracing::info!("token balance of {}: {}", account, account_balance);
    tracing::info!("token balance of {}: {}", recipient, recipient_balance);

    drop(controller);
    drop(events);
    logger.await?;
    Ok(())
}
