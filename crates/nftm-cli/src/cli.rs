use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use nftm_types::{AccountId, Amount, TokenId};

#[derive(Parser)]
#[command(name = "nftm", about = "nftm: NFT marketplace ledger", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Event journal the ledger is rebuilt from
    #[arg(long, global = true, default_value = ".nftm/market.wal")]
    pub journal: PathBuf,

    /// TOML file with market policy
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Mint a token and list it for sale
    Mint(MintArgs),
    /// Show the owner of a token
    OwnerOf(TokenArgs),
    /// Show the metadata URI of a token
    TokenUri(TokenArgs),
    /// Show the full market record of a token
    Item(TokenArgs),
    /// Show how many tokens are listed
    ListedCount,
    /// List tokens currently for sale
    Listed,
    /// List tokens owned by an account
    Owned(OwnedArgs),
    /// Buy a listed token
    Buy(BuyArgs),
    /// Take an owned token off the market
    Delist(DelistArgs),
    /// Put a delisted token back on the market
    Relist(RelistArgs),
    /// Show aggregate market figures
    Summary,
    /// Check ledger invariants against the journal
    Verify,
    /// Show development accounts
    Accounts(AccountsArgs),
}

#[derive(Args)]
pub struct MintArgs {
    pub uri: String,
    #[arg(value_parser = parse_price)]
    pub price: Amount,
    #[arg(long, value_parser = parse_account)]
    pub from: AccountId,
    /// Metadata document the URI points to, checked before minting
    #[arg(long)]
    pub metadata: Option<PathBuf>,
}

#[derive(Args)]
pub struct TokenArgs {
    pub token_id: TokenId,
}

#[derive(Args)]
pub struct OwnedArgs {
    #[arg(value_parser = parse_account)]
    pub account: AccountId,
}

#[derive(Args)]
pub struct BuyArgs {
    pub token_id: TokenId,
    #[arg(long, value_parser = parse_account)]
    pub from: AccountId,
    #[arg(long, value_parser = parse_price)]
    pub pay: Amount,
}

#[derive(Args)]
pub struct DelistArgs {
    pub token_id: TokenId,
    #[arg(long, value_parser = parse_account)]
    pub from: AccountId,
}

#[derive(Args)]
pub struct RelistArgs {
    pub token_id: TokenId,
    #[arg(value_parser = parse_price)]
    pub price: Amount,
    #[arg(long, value_parser = parse_account)]
    pub from: AccountId,
}

#[derive(Args)]
pub struct AccountsArgs {
    #[arg(default_value = "5")]
    pub count: u32,
}

/// `0x`-prefixed hex address, or `dev:<i>` for a development account.
pub fn parse_account(s: &str) -> Result<AccountId, String> {
    if let Some(index) = s.strip_prefix("dev:") {
        let index = index
            .parse::<u32>()
            .map_err(|e| format!("invalid dev account index {index:?}: {e}"))?;
        return Ok(AccountId::dev(index));
    }
    AccountId::from_hex(s).map_err(|e| e.to_string())
}

/// Decimal native units (`0.3`), or raw wei with a `wei` suffix.
pub fn parse_price(s: &str) -> Result<Amount, String> {
    let s = s.trim();
    match s.strip_suffix("wei") {
        Some(wei) => wei.trim().parse::<Amount>().map_err(|e| e.to_string()),
        None => Amount::parse_native(s).map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mint() {
        let cli =
            Cli::try_parse_from(["nftm", "mint", "https://test.com", "0.3", "--from", "dev:0"])
                .unwrap();
        if let Command::Mint(args) = cli.command {
            assert_eq!(args.uri, "https://test.com");
            assert_eq!(args.price, Amount::parse_native("0.3").unwrap());
            assert_eq!(args.from, AccountId::dev(0));
            assert!(args.metadata.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_mint_with_metadata() {
        let cli = Cli::try_parse_from([
            "nftm", "mint", "ipfs://a", "1", "--from", "dev:0", "--metadata", "eevee.json",
        ])
        .unwrap();
        if let Command::Mint(args) = cli.command {
            assert_eq!(args.metadata, Some(PathBuf::from("eevee.json")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_buy_with_wei_payment() {
        let cli = Cli::try_parse_from(["nftm", "buy", "#1", "--from", "dev:1", "--pay", "42wei"])
            .unwrap();
        if let Command::Buy(args) = cli.command {
            assert_eq!(args.token_id, TokenId::FIRST);
            assert_eq!(args.pay, Amount::from_wei(42));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_relist() {
        let cli = Cli::try_parse_from(["nftm", "relist", "2", "1.5", "--from", "dev:3"]).unwrap();
        if let Command::Relist(args) = cli.command {
            assert_eq!(args.token_id, TokenId::new(2));
            assert_eq!(args.price, Amount::parse_native("1.5").unwrap());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn mint_requires_caller() {
        assert!(Cli::try_parse_from(["nftm", "mint", "ipfs://a", "1"]).is_err());
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "nftm",
            "--journal",
            "/tmp/m.wal",
            "--format",
            "json",
            "-v",
            "listed-count",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::ListedCount));
        assert!(matches!(cli.format, OutputFormat::Json));
        assert!(cli.verbose);
        assert_eq!(cli.journal, PathBuf::from("/tmp/m.wal"));
    }

    #[test]
    fn default_journal_location() {
        let cli = Cli::try_parse_from(["nftm", "summary"]).unwrap();
        assert_eq!(cli.journal, PathBuf::from(".nftm/market.wal"));
        assert!(cli.config.is_none());
    }

    #[test]
    fn accounts_parse_hex_and_dev() {
        let dev = AccountId::dev(4);
        assert_eq!(parse_account("dev:4").unwrap(), dev);
        assert_eq!(parse_account(&dev.to_hex()).unwrap(), dev);
        assert!(parse_account("dev:x").is_err());
        assert!(parse_account("0x1234").is_err());
    }

    #[test]
    fn prices_parse_native_and_wei() {
        assert_eq!(
            parse_price("0.3").unwrap(),
            Amount::from_wei(300_000_000_000_000_000)
        );
        assert_eq!(parse_price("7 wei").unwrap(), Amount::from_wei(7));
        assert!(parse_price("-1").is_err());
        assert!(parse_price("abc").is_err());
    }
}
