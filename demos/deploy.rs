//! Signup / signin example.
//!
//! Derives the contract address for a salt, then either checks that it
//! exists (signin) or deploys it through the factory (signup).
//!
//! Usage:
//!   cargo run --example deploy -- signup [SALT_HEX] [PUBLIC_KEY_HEX]
//!   cargo run --example deploy -- signin SALT_HEX
//!
//! Environment:
//!   SECRET_KEY           - payer secret seed, S... (required)
//!   FACTORY_CONTRACT_ID  - factory contract, C... (required)
//!   NETWORK_PASSPHRASE   - network passphrase (default: testnet)
//!   RPC_URL              - Soroban RPC endpoint (default: testnet)
//!   HORIZON_URL          - Horizon endpoint    (default: testnet)

use soroban_deploy_rs::{
    DeployConfig, Deployer, DeploymentRequest, Salt, SigningKeypair, SorobanClient,
};

fn usage() -> Box<dyn std::error::Error> {
    "usage: deploy signup [SALT_HEX] [PUBLIC_KEY_HEX] | deploy signin SALT_HEX".into()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env
    dotenvy::dotenv().ok();

    // Control verbosity with RUST_LOG:
    //   RUST_LOG=info   - address derivation and submission (default)
    //   RUST_LOG=debug  - every step and RPC call
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let secret = std::env::var("SECRET_KEY")
        .map_err(|_| "SECRET_KEY not set, set it in .env or environment")?;
    let config = DeployConfig::from_env()?;

    let mut args = std::env::args().skip(1);
    let mode = args.next().ok_or_else(usage)?;

    let request = match mode.as_str() {
        "signup" => {
            let salt = match args.next() {
                Some(hex) => Salt::from_hex(&hex)?,
                None => Salt::random(),
            };
            let public_key = match args.next() {
                Some(pk) => hex::decode(pk.trim())?,
                None => SigningKeypair::from_seed(rand::random()).public_key().to_vec(),
            };
            DeploymentRequest::signup(salt, public_key)
        }
        "signin" => {
            let salt = Salt::from_hex(&args.next().ok_or_else(usage)?)?;
            DeploymentRequest::signin(salt)
        }
        _ => return Err(usage()),
    };

    println!("═══ Soroban Deploy ═══");
    println!();
    println!("  network: {}", config.network_passphrase);
    println!("  factory: {}", config.factory_address);
    println!("  salt:    {}", hex::encode(request.salt().as_bytes()));

    let client = SorobanClient::new(&config)?;
    let ledger = client.get_latest_ledger().await?;
    println!("  ledger:  {}", ledger.sequence);

    let keypair = SigningKeypair::from_secret(&secret)?;
    println!("  payer:   {}", keypair.account_id());
    println!();

    let deployer = Deployer::new(client, keypair, config);
    let state = deployer.execute(request).await;

    if let Some(err) = state.error {
        println!("═══ Failed: {:?} ═══", err.kind());
        println!("  {}", err);
        if err.is_recoverable() {
            println!("  (recoverable, retry with a fresh attempt)");
        }
        return Err(err.into());
    }

    println!("═══ Complete ═══");
    if let Some(address) = state.address {
        println!("  address: {}", address);
    }
    if let Some(submission) = state.submission {
        println!("  tx hash: {}", submission.hash.unwrap_or_default());
        println!("  ledger:  {}", submission.ledger.unwrap_or_default());
    }

    Ok(())
}
