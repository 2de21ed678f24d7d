use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;

use nftm_fabric::{EventFabric, FabricConfig};
use nftm_ledger::{
    InMemoryMarket, InvariantValidator, LedgerEvent, MarketConfig, MarketReader, MarketWriter,
    NftItem, ProjectionBuilder, ReplayEngine,
};
use nftm_sdk::{HookResponse, MarketContext, MarketHooks};
use nftm_types::{AccountId, NftMeta};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    if let Command::Accounts(args) = &cli.command {
        return cmd_accounts(args, cli.format);
    }

    let session = Session::open(&cli)?;
    match cli.command {
        Command::Mint(args) => session.mint(args),
        Command::OwnerOf(args) => session.owner_of(args),
        Command::TokenUri(args) => session.token_uri(args),
        Command::Item(args) => session.item(args),
        Command::ListedCount => session.listed_count(),
        Command::Listed => {
            let response = session.hooks().listed_nfts().await;
            session.print_items(response)
        }
        Command::Owned(args) => {
            let response = session.hooks().owned_nfts(args.account).await;
            session.print_items(response)
        }
        Command::Buy(args) => session.buy(args),
        Command::Delist(args) => session.delist(args),
        Command::Relist(args) => session.relist(args),
        Command::Summary => session.summary(),
        Command::Verify => session.verify(),
        Command::Accounts(_) => Ok(()),
    }
}

/// A market rebuilt from the journal, writing new events back to it.
struct Session {
    market: Arc<InMemoryMarket>,
    fabric: Arc<EventFabric>,
    recovered: Vec<LedgerEvent>,
    format: OutputFormat,
}

impl Session {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => MarketConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => MarketConfig::default(),
        };

        let fabric = EventFabric::open(&cli.journal, FabricConfig::default())
            .with_context(|| format!("opening journal {}", cli.journal.display()))?;
        let fabric = Arc::new(fabric);
        let recovered = fabric.recover().context("reading journal")?;

        let replayed = ReplayEngine::replay(config, &recovered).context("replaying journal")?;
        let market = replayed.market.with_sink(fabric.clone());

        Ok(Self {
            market: Arc::new(market),
            fabric,
            recovered,
            format: cli.format,
        })
    }

    fn hooks(&self) -> MarketHooks {
        MarketHooks::new(MarketContext::connect(self.market.clone()).with_fabric(self.fabric.clone()))
    }

    /// The ledger has already committed; surface a journal write failure.
    fn ensure_journaled(&self) -> anyhow::Result<()> {
        if self.fabric.journal_failures() > 0 {
            bail!(
                "event committed but not written to {}",
                self.fabric
                    .journal_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
        }
        Ok(())
    }

    fn mint(&self, args: MintArgs) -> anyhow::Result<()> {
        let meta = args.metadata.as_deref().map(load_metadata).transpose()?;
        let token_id = self.market.mint_token(&args.uri, args.price, &args.from)?;
        self.ensure_journaled()?;
        match self.format {
            OutputFormat::Json => print_json(&json!({ "tokenId": token_id, "metadata": meta })),
            OutputFormat::Text => {
                println!(
                    "{} Minted {} to {}",
                    "✓".green().bold(),
                    token_id.to_string().yellow().bold(),
                    args.from.short_id().cyan()
                );
                println!("  Listed at {}", args.price.format_native().bold());
                if let Some(meta) = &meta {
                    println!("  Name:    {}", meta.name.bold());
                    for attribute in &meta.attributes {
                        println!("  {:<8} {}", format!("{}:", attribute.trait_type), attribute.value);
                    }
                }
                Ok(())
            }
        }
    }

    fn owner_of(&self, args: TokenArgs) -> anyhow::Result<()> {
        let owner = self.market.owner_of(args.token_id)?;
        match self.format {
            OutputFormat::Json => print_json(&json!({ "tokenId": args.token_id, "owner": owner })),
            OutputFormat::Text => {
                println!("{owner}");
                Ok(())
            }
        }
    }

    fn token_uri(&self, args: TokenArgs) -> anyhow::Result<()> {
        let uri = self.market.token_uri(args.token_id)?;
        match self.format {
            OutputFormat::Json => print_json(&json!({ "tokenId": args.token_id, "tokenURI": uri })),
            OutputFormat::Text => {
                println!("{uri}");
                Ok(())
            }
        }
    }

    fn item(&self, args: TokenArgs) -> anyhow::Result<()> {
        let item = self.market.get_nft_item(args.token_id)?;
        match self.format {
            OutputFormat::Json => print_json(&item),
            OutputFormat::Text => {
                print_item(&item);
                Ok(())
            }
        }
    }

    fn listed_count(&self) -> anyhow::Result<()> {
        let count = self.market.listed_items_count()?;
        match self.format {
            OutputFormat::Json => print_json(&json!({ "listedItemsCount": count })),
            OutputFormat::Text => {
                println!("{count}");
                Ok(())
            }
        }
    }

    fn print_items(&self, response: HookResponse<Vec<NftItem>>) -> anyhow::Result<()> {
        if let Some(error) = response.error {
            return Err(error.into());
        }
        match self.format {
            OutputFormat::Json => print_json(&response.data),
            OutputFormat::Text => {
                if response.data.is_empty() {
                    println!("No items.");
                }
                for item in &response.data {
                    print_item(item);
                }
                Ok(())
            }
        }
    }

    fn buy(&self, args: BuyArgs) -> anyhow::Result<()> {
        let receipt = self.market.buy_item(args.token_id, &args.from, args.pay)?;
        self.ensure_journaled()?;
        match self.format {
            OutputFormat::Json => print_json(&receipt),
            OutputFormat::Text => {
                println!(
                    "{} Bought {} for {}",
                    "✓".green().bold(),
                    receipt.token_id.to_string().yellow().bold(),
                    receipt.price.format_native().bold()
                );
                println!(
                    "  Pay {} to seller {}",
                    receipt.price.format_native(),
                    receipt.seller.short_id().cyan()
                );
                Ok(())
            }
        }
    }

    fn delist(&self, args: DelistArgs) -> anyhow::Result<()> {
        self.market.delist_item(args.token_id, &args.from)?;
        self.ensure_journaled()?;
        match self.format {
            OutputFormat::Json => print_json(&json!({ "tokenId": args.token_id, "isListed": false })),
            OutputFormat::Text => {
                println!("{} Delisted {}", "✓".green(), args.token_id.to_string().yellow());
                Ok(())
            }
        }
    }

    fn relist(&self, args: RelistArgs) -> anyhow::Result<()> {
        self.market.relist_item(args.token_id, args.price, &args.from)?;
        self.ensure_journaled()?;
        match self.format {
            OutputFormat::Json => print_json(&json!({
                "tokenId": args.token_id,
                "isListed": true,
                "price": args.price,
            })),
            OutputFormat::Text => {
                println!(
                    "{} Relisted {} at {}",
                    "✓".green(),
                    args.token_id.to_string().yellow(),
                    args.price.format_native().bold()
                );
                Ok(())
            }
        }
    }

    fn summary(&self) -> anyhow::Result<()> {
        let summary = ProjectionBuilder::summary(&*self.market)?;
        match self.format {
            OutputFormat::Json => print_json(&summary),
            OutputFormat::Text => {
                println!("Supply:   {}", summary.total_supply.to_string().bold());
                println!("Listed:   {}", summary.listed.to_string().green());
                println!("Delisted: {}", summary.delisted);
                println!("Owners:   {}", summary.distinct_owners);
                println!("Value:    {}", summary.listed_value.format_native().bold());
                Ok(())
            }
        }
    }

    fn verify(&self) -> anyhow::Result<()> {
        let report = InvariantValidator::validate(&*self.market)?;
        let converged = ReplayEngine::verify_convergence(&*self.market, &self.recovered)?;

        match self.format {
            OutputFormat::Json => print_json(&json!({
                "events": self.recovered.len(),
                "totalSupply": report.total_supply,
                "listedItemsCount": report.listed_items_count,
                "converged": converged,
                "violations": report
                    .violations
                    .iter()
                    .map(|v| v.description.clone())
                    .collect::<Vec<_>>(),
            }))?,
            OutputFormat::Text => {
                println!("Journal: {} events", self.recovered.len().to_string().bold());
                println!(
                    "Supply: {}, listed: {}",
                    report.total_supply, report.listed_items_count
                );
                for violation in &report.violations {
                    println!("  {} {}", "✗".red().bold(), violation.description);
                }
            }
        }

        if !report.is_valid() || !converged {
            bail!("ledger failed verification");
        }
        if self.format_is_text() {
            println!("{} Ledger invariants hold", "✓".green().bold());
        }
        Ok(())
    }

    fn format_is_text(&self) -> bool {
        matches!(self.format, OutputFormat::Text)
    }
}

fn cmd_accounts(args: &AccountsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let accounts: Vec<(String, AccountId)> = (0..args.count)
        .map(|i| (format!("dev:{i}"), AccountId::dev(i)))
        .collect();
    match format {
        OutputFormat::Json => print_json(
            &accounts
                .iter()
                .map(|(alias, account)| json!({ "alias": alias, "address": account }))
                .collect::<Vec<_>>(),
        ),
        OutputFormat::Text => {
            for (alias, account) in &accounts {
                println!("{:<8} {}", alias.yellow(), account);
            }
            Ok(())
        }
    }
}

fn load_metadata(path: &Path) -> anyhow::Result<NftMeta> {
    let json =
        fs::read_to_string(path).with_context(|| format!("reading metadata {}", path.display()))?;
    NftMeta::from_json(&json).with_context(|| format!("invalid metadata {}", path.display()))
}

fn print_item(item: &NftItem) {
    let state = if item.is_listed {
        "listed".green()
    } else {
        "delisted".dimmed()
    };
    println!(
        "{}  {}  {}",
        item.token_id.to_string().yellow().bold(),
        item.price.format_native().bold(),
        state
    );
    println!("  URI:     {}", item.token_uri.blue());
    println!("  Owner:   {}", item.owner);
    println!("  Creator: {}", item.creator);
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
