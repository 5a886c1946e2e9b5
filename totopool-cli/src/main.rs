//! # Totopool CLI
//!
//! Operator and simulator front end for the totopool settlement engine. Engine
//! state and the in-memory asset book persist in a JSON state file between
//! invocations.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::prelude::*;
use totopool_core::{
    utils::*, Address, Amount, ClaimId, Clock, ConditionId, Denomination, Engine, EngineConfig,
    Event, InMemoryAssets, ManualClock, NewCondition, OutcomeId, Snapshot, SystemClock,
};

type CliEngine = Engine<InMemoryAssets, ManualClock>;

#[derive(Parser)]
#[command(name = "totopool")]
#[command(about = "Oracle-resolved pari-mutuel wagering settlement engine")]
#[command(version)]
struct Cli {
    /// State file holding the engine snapshot and asset balances
    #[arg(short, long, global = true, default_value = "totopool-state.json")]
    state: PathBuf,

    /// Address (x-only public key, hex) performing the operation
    #[arg(short, long, global = true)]
    caller: Option<String>,

    /// Current time, Unix seconds or RFC 3339 (defaults to the system clock)
    #[arg(short, long, global = true)]
    now: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty state file
    Init {
        /// Protocol owner address
        #[arg(short, long)]
        owner: String,
        /// JSON engine config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Credit an address in the simulated asset book
    Fund {
        address: String,
        amount: Amount,
        /// Credit native currency instead of the token
        #[arg(long)]
        native: bool,
    },
    /// Grant oracle rights (owner only)
    AddOracle { address: String },
    /// Withdraw oracle rights (owner only)
    RevokeOracle { address: String },
    /// Set the fee rate for new conditions, in percent (owner only)
    SetFee { percent: f64 },
    /// Open a condition (oracle only)
    Create {
        /// Outcome identifiers, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        outcomes: Vec<OutcomeId>,
        /// Settlement time
        #[arg(long)]
        settles: String,
        /// Betting start (defaults to now)
        #[arg(long)]
        starts: Option<String>,
        /// Oracle-local identifier (defaults to the next unused one)
        #[arg(long)]
        local_id: Option<u64>,
        /// Grouping key
        #[arg(long)]
        scope: Option<u64>,
        /// 32-byte metadata hash (hex)
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Stake on an outcome
    Bet {
        condition: String,
        outcome: OutcomeId,
        amount: Amount,
        /// Pay with native currency
        #[arg(long)]
        native: bool,
    },
    /// Resolve a condition (condition oracle only)
    Resolve { condition: String, outcome: OutcomeId },
    /// Cancel a condition (condition oracle only)
    Cancel { condition: String },
    /// Move a condition's betting window (condition oracle only)
    Shift {
        condition: String,
        #[arg(long)]
        starts: String,
        #[arg(long)]
        settles: String,
    },
    /// Redeem claims, written <condition>:<outcome>
    Redeem {
        #[arg(required = true)]
        claims: Vec<String>,
        /// Receive native currency
        #[arg(long)]
        native: bool,
    },
    /// Transfer accrued protocol fees to the owner
    ClaimFee,
    /// Show a condition
    Info { condition: String },
    /// List all conditions
    List,
    /// Show asset and claim balances of an address
    Balance { address: String },
}

/// On-disk state: the versioned engine snapshot plus the simulated asset book.
#[derive(Serialize, Deserialize)]
struct StateFile {
    snapshot: serde_json::Value,
    assets: InMemoryAssets,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "totopool=info,totopool_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let now = match &cli.now {
        Some(now) => parse_timestamp(now)?,
        None => SystemClock.now(),
    };
    debug!(now, state = %cli.state.display(), "starting");

    let mut engine = match &cli.command {
        Commands::Init { owner, config } => init(&cli.state, owner, config.as_deref(), now)?,
        _ => load(&cli.state, now)?,
    };
    run(&cli, &mut engine)?;

    for event in engine.take_events() {
        print_event(&event);
    }
    save(&cli.state, &engine)
}

fn run(cli: &Cli, engine: &mut CliEngine) -> Result<()> {
    match &cli.command {
        Commands::Init { .. } => {
            println!("{}", "Engine initialized".green().bold());
            println!("{}", "═".repeat(50).bright_black());
            println!("{}: {}", "Owner".yellow().bold(), engine.owner());
            print_config(engine.config());
            println!("{}: {}", "State File".yellow().bold(), cli.state.display());
        }

        Commands::Fund {
            address,
            amount,
            native,
        } => {
            let address: Address = address.parse()?;
            engine
                .assets_mut()
                .mint(&address, *amount, denomination(*native));
            println!(
                "{}: {} credited with {} {}",
                "Funded".green().bold(),
                address.to_string().cyan(),
                amount.to_string().yellow(),
                unit(*native)
            );
        }

        Commands::AddOracle { address } => {
            engine.add_oracle(&caller(cli)?, address.parse()?)?;
        }

        Commands::RevokeOracle { address } => {
            engine.revoke_oracle(&caller(cli)?, &address.parse()?)?;
        }

        Commands::SetFee { percent } => {
            engine.set_fee_rate(&caller(cli)?, percent_to_fee_rate(*percent)?)?;
        }

        Commands::Create {
            outcomes,
            settles,
            starts,
            local_id,
            scope,
            metadata,
        } => {
            let params = NewCondition {
                oracle_condition_id: *local_id,
                scope_id: *scope,
                outcomes: outcomes.clone(),
                betting_starts_at: starts.as_deref().map(parse_timestamp).transpose()?,
                settles_at: parse_timestamp(settles)?,
                metadata: metadata
                    .as_deref()
                    .map(parse_metadata)
                    .transpose()?
                    .unwrap_or_default(),
            };
            let id = engine.create_condition(&caller(cli)?, params)?;
            println!("{}", "Condition Created Successfully!".green().bold());
            print_condition(engine, &id)?;
        }

        Commands::Bet {
            condition,
            outcome,
            amount,
            native,
        } => {
            let id: ConditionId = condition.parse()?;
            let caller = caller(cli)?;
            let claim = if *native {
                engine.place_bet_native(&caller, &id, *outcome, *amount)?
            } else {
                engine.place_bet(&caller, &id, *outcome, *amount)?
            };
            println!("{}: {}", "Claim".green().bold(), claim.to_string().cyan());
        }

        Commands::Resolve { condition, outcome } => {
            engine.resolve_condition(&caller(cli)?, &condition.parse()?, *outcome)?;
        }

        Commands::Cancel { condition } => {
            engine.cancel_condition(&caller(cli)?, &condition.parse()?)?;
        }

        Commands::Shift {
            condition,
            starts,
            settles,
        } => {
            engine.shift_condition(
                &caller(cli)?,
                &condition.parse()?,
                parse_timestamp(starts)?,
                parse_timestamp(settles)?,
            )?;
        }

        Commands::Redeem { claims, native } => {
            let claims = claims
                .iter()
                .map(|claim| claim.parse::<ClaimId>())
                .collect::<Result<Vec<_>, _>>()?;
            let caller = caller(cli)?;
            let paid = if *native {
                engine.redeem_native(&caller, &claims)?
            } else {
                engine.redeem(&caller, &claims)?
            };
            println!(
                "{}: {} {}",
                "Paid".green().bold(),
                paid.to_string().yellow(),
                unit(*native)
            );
        }

        Commands::ClaimFee => {
            let amount = engine.claim_protocol_fee(&caller(cli)?)?;
            if amount == 0 {
                println!("{}", "No protocol fees to claim.".bright_black());
            }
        }

        Commands::Info { condition } => {
            print_condition(engine, &condition.parse()?)?;
        }

        Commands::List => {
            let mut conditions: Vec<_> = engine.conditions().collect();
            conditions.sort_by_key(|c| (c.settles_at, c.id));
            if conditions.is_empty() {
                println!("{}", "No conditions yet.".bright_black());
            }
            let now = engine.clock().now();
            let timeout = engine.config().resolution_timeout;
            for condition in conditions {
                println!(
                    "{}  {}  pool {}  {}",
                    condition.id.to_string().cyan(),
                    format_timestamp(condition.settles_at),
                    condition.pool().to_string().yellow(),
                    condition.describe(now, timeout)
                );
            }
        }

        Commands::Balance { address } => {
            let address: Address = address.parse()?;
            let assets = engine.assets();
            println!("{}: {}", "Address".yellow().bold(), address.to_string().cyan());
            println!(
                "{}: {}",
                "Token".yellow().bold(),
                assets.balance(&address, Denomination::Token)
            );
            println!(
                "{}: {}",
                "Native".yellow().bold(),
                assets.balance(&address, Denomination::Native)
            );
            let claims = engine.claims_of(&address);
            if !claims.is_empty() {
                println!("{}", "Claims".yellow().bold());
                for (claim, amount) in claims {
                    let preview = match engine.preview_payout(&claim, &address) {
                        Ok(redemption) => format!("redeems for {}", redemption.amount()),
                        Err(err) => err.to_string(),
                    };
                    println!("  {}  {}  ({})", claim.to_string().cyan(), amount, preview.bright_black());
                }
            }
        }
    }
    Ok(())
}

fn caller(cli: &Cli) -> Result<Address> {
    let caller = cli
        .caller
        .as_deref()
        .context("This command needs --caller <address>")?;
    Ok(caller.parse()?)
}

fn denomination(native: bool) -> Denomination {
    if native {
        Denomination::Native
    } else {
        Denomination::Token
    }
}

fn unit(native: bool) -> &'static str {
    if native {
        "native"
    } else {
        "tokens"
    }
}

/// Fresh engine for a state file that does not exist yet.
fn init(path: &Path, owner: &str, config: Option<&Path>, now: u64) -> Result<CliEngine> {
    if path.exists() {
        bail!("State file {} already exists", path.display());
    }
    let owner: Address = owner.parse()?;
    let config = match config {
        Some(config) => EngineConfig::load(config)
            .with_context(|| format!("Failed to load config {}", config.display()))?,
        None => EngineConfig::default(),
    };
    Ok(Engine::new(owner, config, InMemoryAssets::new(), ManualClock::new(now))?)
}

fn load(path: &Path, now: u64) -> Result<CliEngine> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file {} (run `init` first)", path.display()))?;
    let state: StateFile = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse state file {}", path.display()))?;
    let snapshot = Snapshot::from_json(&state.snapshot.to_string())?;
    Ok(Engine::restore(snapshot, state.assets, ManualClock::new(now))?)
}

fn save(path: &Path, engine: &CliEngine) -> Result<()> {
    let state = StateFile {
        snapshot: serde_json::to_value(engine.snapshot())?,
        assets: engine.assets().clone(),
    };
    let json = serde_json::to_string_pretty(&state)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write state file {}", path.display()))?;
    Ok(())
}

fn print_config(config: &EngineConfig) {
    println!("{}: {}%", "Fee".yellow().bold(), fee_rate_to_percent(config.fee_rate));
    println!("{}: {}s", "Minimum Lead Time".yellow().bold(), config.min_lead_time);
    println!("{}: {}s", "Cancel Grace Period".yellow().bold(), config.cancel_grace_period);
    println!("{}: {}s", "Resolution Timeout".yellow().bold(), config.resolution_timeout);
}

fn print_condition(engine: &CliEngine, id: &ConditionId) -> Result<()> {
    let condition = engine.condition(id)?;
    let now = engine.clock().now();

    println!("{}", "═".repeat(50).bright_black());
    println!("{}: {}", "Condition ID".yellow().bold(), condition.id.to_string().cyan());
    println!("{}: {}", "Oracle".yellow().bold(), condition.oracle);
    println!("{}: {}", "Local ID".yellow().bold(), condition.oracle_condition_id);
    if let Some(scope) = condition.scope_id {
        println!("{}: {}", "Scope".yellow().bold(), scope);
    }
    println!("{}: {}", "Betting Opens".yellow().bold(), format_timestamp(condition.betting_starts_at));
    println!("{}: {}", "Settles".yellow().bold(), format_timestamp(condition.settles_at));
    println!("{}: {}%", "Fee".yellow().bold(), fee_rate_to_percent(condition.fee_rate));
    println!("{}: {}", "Pool".yellow().bold(), condition.pool());
    for (outcome, total) in condition.outcomes.iter().zip(&condition.totals) {
        let odds = condition
            .odds(*outcome)
            .map(|odds| format!("{odds:.2}x"))
            .unwrap_or_else(|| "-".to_string());
        let marker = if condition.winning_outcome() == Some(*outcome) {
            " (winner)".green().bold().to_string()
        } else {
            String::new()
        };
        println!("  {} {}: {} staked, odds {}{}", "Outcome".yellow(), outcome, total, odds, marker);
    }
    println!(
        "{}: {}",
        "Status".yellow().bold(),
        condition.describe(now, engine.config().resolution_timeout)
    );
    println!("{}", "═".repeat(50).bright_black());
    Ok(())
}

fn print_event(event: &Event) {
    let line = match event {
        Event::OracleAdded { oracle } => format!("oracle {oracle} added"),
        Event::OracleRevoked { oracle } => format!("oracle {oracle} revoked"),
        Event::FeeRateChanged { fee_rate } => {
            format!("fee rate set to {}%", fee_rate_to_percent(*fee_rate))
        }
        Event::ConditionCreated { condition_id, .. } => format!("condition {condition_id} created"),
        Event::ConditionResolved {
            condition_id,
            winning_outcome,
        } => format!("condition {condition_id} resolved, outcome {winning_outcome} won"),
        Event::ConditionCanceled { condition_id } => format!("condition {condition_id} canceled"),
        Event::ConditionRescheduled {
            condition_id,
            betting_starts_at,
            settles_at,
        } => format!(
            "condition {condition_id} rescheduled: {} to {}",
            format_timestamp(*betting_starts_at),
            format_timestamp(*settles_at)
        ),
        Event::NewBet {
            claim,
            bettor,
            amount,
            ..
        } => format!("{bettor} staked {amount} on {claim}"),
        Event::Redeemed {
            claim,
            holder,
            amount,
        } => format!("{holder} redeemed {claim} for {amount}"),
        Event::ProtocolFeeClaimed { owner, amount } => {
            format!("{owner} claimed {amount} in protocol fees")
        }
    };
    println!("{} {}", "▸".bright_blue(), line);
}
