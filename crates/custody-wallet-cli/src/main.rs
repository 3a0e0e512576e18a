//! Custody Wallet CLI
//!
//! Command-line front end for custody wallets: resolve locators, create
//! wallets, send transactions, sign messages and manage delegated signers.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use custody_wallet_client::{ClientConfig, HttpTransport};
use custody_wallet_core::{
    ApprovalOrchestrator, ApprovalSubmission, Chain, ChainFamily, CustodyTransport,
    DelegatedSignerRegistry, EvmCall, EvmKeypair, EvmSmartWallet, Intent, LinkedUser, PollPolicy,
    RequestKind, SignerConfig, SignerRef, SolanaKeypair, SolanaSmartWallet, WalletLocator,
    WalletManager, WalletType,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "custody-wallet")]
#[command(about = "Custody wallet CLI", version)]
struct Cli {
    /// Custody API base URL
    #[arg(long, env = "CUSTODY_API_URL", global = true)]
    api_url: Option<String>,

    /// Custody API key
    #[arg(long, env = "CUSTODY_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long, env = "CUSTODY_TIMEOUT_SECS", default_value_t = 30, global = true)]
    timeout_secs: u64,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical locator of a wallet
    Locator {
        #[command(flatten)]
        target: Target,
    },

    /// Generate a local keypair
    Keygen {
        #[arg(long, value_enum, default_value = "evm")]
        family: FamilyArg,
    },

    /// Create or inspect wallets
    #[command(subcommand)]
    Wallet(WalletCommand),

    /// Token balances of a wallet
    Balances {
        #[command(flatten)]
        target: Target,

        /// Chain to include (repeatable)
        #[arg(long = "chain")]
        chains: Vec<Chain>,

        /// Token to include (repeatable)
        #[arg(long = "token", required = true)]
        tokens: Vec<String>,
    },

    /// Send a single call from an EVM smart wallet
    SendEvm {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        signer: SignerArgs,
        #[command(flatten)]
        poll: PollArgs,

        #[arg(long)]
        chain: Chain,

        #[arg(long)]
        to: String,

        /// Value in wei
        #[arg(long, default_value = "0")]
        value: String,

        /// Calldata as 0x-hex
        #[arg(long, default_value = "0x")]
        data: String,

        /// Signer whose approval is also required (repeatable)
        #[arg(long = "required-signer")]
        required_signers: Vec<String>,

        /// Pre-computed approval as `<signer>=<signature>` (repeatable)
        #[arg(long = "cosignature")]
        cosignatures: Vec<String>,
    },

    /// Send a base58 serialized transaction from a Solana smart wallet
    SendSolana {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        signer: SignerArgs,
        #[command(flatten)]
        poll: PollArgs,

        #[arg(long)]
        transaction: String,

        /// Signer whose approval is also required (repeatable)
        #[arg(long = "required-signer")]
        required_signers: Vec<String>,

        /// Pre-computed approval as `<signer>=<signature>` (repeatable)
        #[arg(long = "cosignature")]
        cosignatures: Vec<String>,
    },

    /// Sign a plain message
    SignMessage {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        signer: SignerArgs,
        #[command(flatten)]
        poll: PollArgs,

        #[arg(long)]
        chain: Chain,

        message: String,
    },

    /// Sign EIP-712 typed data read from a JSON file
    SignTypedData {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        signer: SignerArgs,
        #[command(flatten)]
        poll: PollArgs,

        #[arg(long)]
        chain: Chain,

        file: PathBuf,
    },

    /// Keep polling a request created earlier
    Status {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        signer: SignerArgs,
        #[command(flatten)]
        poll: PollArgs,

        #[arg(long, value_enum, default_value = "transaction")]
        kind: KindArg,

        #[arg(long)]
        id: String,
    },

    /// Approve a request as a co-signer, without polling it
    Approve {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        signer: SignerArgs,

        #[arg(long, value_enum, default_value = "transaction")]
        kind: KindArg,

        #[arg(long)]
        id: String,

        /// Pre-computed signature; signs locally when omitted
        #[arg(long, requires = "approver")]
        signature: Option<String>,

        /// Signer the pre-computed signature belongs to
        #[arg(long)]
        approver: Option<String>,
    },

    /// Manage delegated signers
    #[command(subcommand)]
    Signer(SignerCommand),
}

#[derive(Subcommand)]
enum WalletCommand {
    /// Create a wallet administered by the given signer
    Create {
        #[arg(long = "type", default_value = "evm-smart-wallet")]
        wallet_type: WalletType,
        #[command(flatten)]
        signer: SignerArgs,
        #[command(flatten)]
        user: UserArgs,
    },

    /// Show a wallet
    Get {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Subcommand)]
enum SignerCommand {
    /// Register a delegated signer
    Register {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        signer: String,

        #[arg(long)]
        chain: Option<Chain>,

        /// Expire the registration after this many minutes
        #[arg(long)]
        expires_in_mins: Option<i64>,
    },

    /// Show a delegated signer; expired registrations are reported as absent
    Get {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        signer: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FamilyArg {
    Evm,
    Solana,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Transaction,
    Signature,
}

impl From<KindArg> for RequestKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Transaction => RequestKind::Transaction,
            KindArg::Signature => RequestKind::Signature,
        }
    }
}

#[derive(Args)]
struct UserArgs {
    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    #[arg(long)]
    user_id: Option<String>,
}

impl UserArgs {
    fn linked_user(&self) -> Result<Option<LinkedUser>> {
        if self.email.is_none() && self.phone.is_none() && self.user_id.is_none() {
            return Ok(None);
        }
        let user = LinkedUser::from_fields(
            self.email.as_deref(),
            self.phone.as_deref(),
            self.user_id.as_deref(),
        )?;
        Ok(Some(user))
    }
}

/// Wallet addressed by its address or by its linked user
#[derive(Args)]
struct Target {
    #[arg(long, conflicts_with_all = ["email", "phone", "user_id"])]
    address: Option<String>,

    #[command(flatten)]
    user: UserArgs,

    #[arg(long = "type", default_value = "evm-smart-wallet")]
    wallet_type: WalletType,
}

impl Target {
    fn locator(&self) -> Result<WalletLocator> {
        let locator = match (&self.address, self.user.linked_user()?) {
            (Some(address), _) => WalletLocator::from_address(address, self.wallet_type)?,
            (None, Some(user)) => WalletLocator::from_linked_user(&user, self.wallet_type)?,
            (None, None) => bail!("pass --address or one of --email, --phone, --user-id"),
        };
        Ok(locator)
    }
}

/// Admin signer of the wallet; exactly one must be given
#[derive(Args)]
struct SignerArgs {
    /// EVM secret key as hex
    #[arg(long, env = "CUSTODY_EVM_SECRET", hide_env_values = true)]
    evm_secret: Option<String>,

    /// Solana secret key as base58
    #[arg(long, env = "CUSTODY_SOLANA_SECRET", hide_env_values = true)]
    solana_secret: Option<String>,

    /// Reference of a signer held by the custody service
    #[arg(long)]
    custodial: Option<String>,

    /// Admin key held in Fireblocks (Solana only)
    #[arg(long)]
    fireblocks: bool,
}

impl SignerArgs {
    fn config(&self) -> Result<SignerConfig> {
        let mut configs = Vec::new();
        if let Some(secret) = &self.evm_secret {
            configs.push(SignerConfig::local(EvmKeypair::from_hex(secret)?));
        }
        if let Some(secret) = &self.solana_secret {
            configs.push(SignerConfig::local(SolanaKeypair::from_base58(secret)?));
        }
        if let Some(reference) = &self.custodial {
            configs.push(SignerConfig::custodial(reference.as_str()));
        }
        if self.fireblocks {
            configs.push(SignerConfig::FireblocksCustodial);
        }

        match configs.len() {
            1 => Ok(configs.remove(0)),
            0 => bail!("pass one of --evm-secret, --solana-secret, --custodial, --fireblocks"),
            _ => bail!("pass only one of --evm-secret, --solana-secret, --custodial, --fireblocks"),
        }
    }
}

#[derive(Args)]
struct PollArgs {
    /// Seconds between status reads
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Stop after this many status reads
    #[arg(long, conflicts_with = "deadline_secs")]
    max_attempts: Option<u32>,

    /// Stop after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,
}

impl PollArgs {
    /// Local signers settle quickly; anyone else may be waiting on a human
    fn policy(&self, signer: &SignerConfig) -> PollPolicy {
        let mut policy = if signer.can_sign_locally() {
            PollPolicy::local_signer()
        } else {
            PollPolicy::human_approval()
        };
        if let Some(secs) = self.interval_secs {
            policy = policy.with_interval(Duration::from_secs(secs));
        }
        if let Some(attempts) = self.max_attempts {
            policy = policy.with_max_attempts(attempts);
        }
        if let Some(secs) = self.deadline_secs {
            policy = policy.with_deadline(Duration::from_secs(secs));
        }
        policy
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Locator { target } => {
            println!("{}", target.locator()?);
        }
        Commands::Keygen { family } => keygen(*family),
        Commands::Wallet(WalletCommand::Create {
            wallet_type,
            signer,
            user,
        }) => {
            let manager = WalletManager::new(transport(&cli)?);
            let wallet =
                manager.create_wallet(*wallet_type, &signer.config()?, user.linked_user()?.as_ref())?;
            print_json(&wallet)?;
        }
        Commands::Wallet(WalletCommand::Get { target }) => {
            let manager = WalletManager::new(transport(&cli)?);
            print_json(&manager.get_wallet(target.locator()?.as_str())?)?;
        }
        Commands::Balances {
            target,
            chains,
            tokens,
        } => {
            let manager = WalletManager::new(transport(&cli)?);
            let balances = manager.get_balances(target.locator()?.as_str(), chains, tokens)?;
            for balance in &balances {
                let chain = balance.chain.map(|c| c.to_string()).unwrap_or_default();
                println!("{:<10} {:>24} {}", balance.token, balance.formatted(), chain);
            }
        }
        Commands::SendEvm {
            target,
            signer,
            poll,
            chain,
            to,
            value,
            data,
            required_signers,
            cosignatures,
        } => {
            let signer = signer.config()?;
            let policy = poll.policy(&signer);
            let wallet = EvmSmartWallet::new(transport(&cli)?, target.locator()?, signer, policy)?;
            let intent = Intent::calls(*chain, vec![EvmCall::new(to.as_str(), value.as_str(), data.as_str())])
                .with_required_signers(signer_refs(required_signers));
            let intent = with_cosignatures(intent, cosignatures)?;
            print_json(&resumable(wallet.submit_transaction(&intent))?)?;
        }
        Commands::SendSolana {
            target,
            signer,
            poll,
            transaction,
            required_signers,
            cosignatures,
        } => {
            let signer = signer.config()?;
            let policy = poll.policy(&signer);
            let wallet = SolanaSmartWallet::new(transport(&cli)?, target.locator()?, signer, policy)?;
            let intent = Intent::solana_transaction(transaction.as_str())
                .with_required_signers(signer_refs(required_signers));
            let intent = with_cosignatures(intent, cosignatures)?;
            print_json(&resumable(wallet.submit_transaction(&intent))?)?;
        }
        Commands::SignMessage {
            target,
            signer,
            poll,
            chain,
            message,
        } => {
            let signer = signer.config()?;
            let policy = poll.policy(&signer);
            let locator = target.locator()?;
            let receipt = match locator.family() {
                ChainFamily::Evm => EvmSmartWallet::new(transport(&cli)?, locator, signer, policy)?
                    .sign_message(*chain, message),
                ChainFamily::Solana => {
                    SolanaSmartWallet::new(transport(&cli)?, locator, signer, policy)?
                        .sign_message(message)
                }
            };
            print_json(&resumable(receipt)?)?;
        }
        Commands::SignTypedData {
            target,
            signer,
            poll,
            chain,
            file,
        } => {
            let raw = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let typed_data: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
            let signer = signer.config()?;
            let policy = poll.policy(&signer);
            let wallet = EvmSmartWallet::new(transport(&cli)?, target.locator()?, signer, policy)?;
            print_json(&resumable(wallet.sign_typed_data(*chain, typed_data))?)?;
        }
        Commands::Status {
            target,
            signer,
            poll,
            kind,
            id,
        } => {
            let signer = signer.config()?;
            let policy = poll.policy(&signer);
            let locator = target.locator()?;
            let orchestrator = ApprovalOrchestrator::new(transport(&cli)?, signer, policy);
            let request = resumable(orchestrator.resume((*kind).into(), locator.as_str(), id))?;
            print_json(&request)?;
        }
        Commands::Approve {
            target,
            signer,
            kind,
            id,
            signature,
            approver,
        } => {
            let locator = target.locator()?;
            let transport = transport(&cli)?;
            let (approver, approvals) = match (signature, approver) {
                (Some(signature), Some(approver)) => {
                    let approver = SignerRef::new(approver.as_str());
                    let approval = ApprovalSubmission::new(approver.clone(), signature.as_str());
                    (SignerConfig::custodial(approver), vec![approval])
                }
                _ => {
                    let signer = signer.config()?;
                    let approvals = sign_pending(&transport, &signer, &locator, (*kind).into(), id)?;
                    (signer, approvals)
                }
            };
            let orchestrator =
                ApprovalOrchestrator::new(transport, approver, PollPolicy::human_approval());
            let request = orchestrator.approve((*kind).into(), locator.as_str(), id, &approvals)?;
            print_json(&request)?;
        }
        Commands::Signer(SignerCommand::Register {
            target,
            signer,
            chain,
            expires_in_mins,
        }) => {
            let transport = transport(&cli)?;
            let expires_at =
                expires_in_mins.map(|mins| chrono::Utc::now() + chrono::Duration::minutes(mins));
            let registered = DelegatedSignerRegistry::new(&transport).register(
                target.locator()?.as_str(),
                SignerRef::new(signer.as_str()),
                *chain,
                expires_at,
                Vec::new(),
            )?;
            print_json(&registered)?;
        }
        Commands::Signer(SignerCommand::Get { target, signer }) => {
            let transport = transport(&cli)?;
            let found = DelegatedSignerRegistry::new(&transport)
                .get(target.locator()?.as_str(), &SignerRef::new(signer.as_str()))?;
            match found {
                Some(record) => print_json(&record)?,
                None => println!("{} is not registered or has expired", signer),
            }
        }
    }

    Ok(())
}

fn transport(cli: &Cli) -> Result<HttpTransport> {
    let url = cli
        .api_url
        .as_deref()
        .context("set CUSTODY_API_URL or pass --api-url")?;
    let key = cli
        .api_key
        .as_deref()
        .context("set CUSTODY_API_KEY or pass --api-key")?;
    let config = ClientConfig::new(url, key).with_timeout(Duration::from_secs(cli.timeout_secs));
    Ok(HttpTransport::new(config)?)
}

fn keygen(family: FamilyArg) {
    match family {
        FamilyArg::Evm => {
            let kp = EvmKeypair::generate();
            println!("Address: {}", kp.address());
            println!("Signer:  {}", kp.signer_ref());
            println!("Secret:  {}", kp.secret_hex().as_str());
        }
        FamilyArg::Solana => {
            let kp = SolanaKeypair::generate();
            println!("Public key: {}", kp.public_key());
            println!("Signer:     {}", kp.signer_ref());
            println!("Secret:     {}", kp.secret_base58().as_str());
        }
    }
}

/// Sign the pending approval addressed to `signer` on an existing request
fn sign_pending<T: CustodyTransport>(
    transport: &T,
    signer: &SignerConfig,
    locator: &WalletLocator,
    kind: RequestKind,
    id: &str,
) -> Result<Vec<ApprovalSubmission>> {
    let request = transport
        .get_request(locator.as_str(), kind, id)
        .with_context(|| format!("reading {} {}", kind, id))?;
    let identity = signer.signer_identity();
    let Some(pending) = request.approvals.as_ref().and_then(|a| a.pending_for(&identity)) else {
        bail!("no approval pending for {} on {} {}", identity, kind, id);
    };
    let signature = signer.sign(&pending.message)?;
    info!(request_id = id, signer = %identity, "Signed pending approval");
    Ok(vec![ApprovalSubmission::new(pending.signer.clone(), signature)])
}

fn signer_refs(raw: &[String]) -> Vec<SignerRef> {
    raw.iter().map(|s| SignerRef::new(s.as_str())).collect()
}

/// Attach `<signer>=<signature>` pairs as external approvals
fn with_cosignatures(intent: Intent, raw: &[String]) -> Result<Intent> {
    raw.iter().try_fold(intent, |intent, entry| {
        let Some((signer, signature)) = entry.split_once('=') else {
            bail!("--cosignature expects <signer>=<signature>, got {:?}", entry);
        };
        if signer.is_empty() || signature.is_empty() {
            bail!("--cosignature expects <signer>=<signature>, got {:?}", entry);
        }
        Ok(intent.with_external_approval(ApprovalSubmission::new(SignerRef::new(signer), signature)))
    })
}

/// Point timeouts and cancellations at the `status` command
fn resumable<T>(result: custody_wallet_core::Result<T>) -> Result<T> {
    result.map_err(|e| match e.resumable_id().map(str::to_string) {
        Some(id) => anyhow::Error::new(e)
            .context(format!("request {} is still open; resume with `custody-wallet status --id {}`", id, id)),
        None => e.into(),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
