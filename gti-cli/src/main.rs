//! GTI CLI: market data, SQL, analytics, charts and prompts from the shell.
//!
//! Commands:
//! - `config get|list`: read the auth file (secrets masked)
//! - `bars` / `quote`: broker market data (IB gateway or Alpaca)
//! - `query`: run SQL against Redshift or MySQL
//! - `analyze`: statistics over a saved CSV/Parquet frame
//! - `plot`: write a chart of one or more frames as HTML or JSON
//! - `ask`: one-shot text generation
//! - `s3 get|put`: object transfer
//! - `fred` / `bls`: economic series
//! - `dummy`: random frame for demos and smoke tests
//!
//! Frames print to stdout; `--save-dir` also writes them under a dated
//! directory. Logs go to stderr.

mod logging;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gti_clients::broker::Side;
use gti_clients::sql::SqlStore;
use gti_clients::{Alpaca, Bls, DataLoader, Fred, GenAi, IbClient, MySql, Redshift, S3Client};
use gti_core::analytics::describe::forecast_to_dataframe;
use gti_core::analytics::{Measure, Period};
use gti_core::chart::QuickPlot;
use gti_core::config::{
    mask, AlpacaCredentials, AwsCredentials, BlsCredentials, FredCredentials, IbCredentials,
    MySqlCredentials, OpenAiCredentials, RedshiftCredentials,
};
use gti_core::data::{format_of, DataSaver, FileFormat};
use gti_core::{ConfigLoader, DataAnalytics, TimeFrame};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "gti",
    version,
    about = "GTI: broker data, SQL, analytics and charts"
)]
struct Cli {
    /// Auth file. Defaults to $GTI_AUTH_FILE, then ./auth.toml.
    #[arg(long, global = true)]
    auth: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the auth file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Daily (or Alpaca timeframe) bars for a symbol.
    Bars {
        symbol: String,

        /// Start date (YYYY-MM-DD). Defaults to one year before --end.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(long, value_enum, default_value_t = Broker::Ib)]
        broker: Broker,

        /// Alpaca bar timeframe: 1Day, 1Hour, 15Min.
        #[arg(long, default_value = "1Day")]
        timeframe: String,

        #[command(flatten)]
        save: SaveArgs,
    },
    /// Snapshot quote from the IB gateway.
    Quote { symbol: String },
    /// Alpaca account, positions and market orders.
    Alpaca {
        #[command(subcommand)]
        action: AlpacaAction,
    },
    /// Run SQL and print the result.
    Query {
        #[arg(value_enum)]
        store: Store,

        sql: String,

        /// Execute as a statement and report rows affected.
        #[arg(long, default_value_t = false)]
        write: bool,

        /// Use a connection pool instead of a fresh connection.
        #[arg(long, default_value_t = false)]
        pool: bool,

        #[command(flatten)]
        save: SaveArgs,
    },
    /// Statistics over a saved frame (first column is the date index).
    Analyze {
        file: PathBuf,

        #[command(subcommand)]
        op: Analysis,

        #[command(flatten)]
        save: SaveArgs,
    },
    /// Chart one or more saved frames.
    Plot {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = PlotKind::Line)]
        kind: PlotKind,

        /// X column; the index column when omitted.
        #[arg(long)]
        x: Option<String>,

        /// Y column; the first value column when omitted.
        #[arg(long)]
        y: Option<String>,

        #[arg(long, default_value = "")]
        title: String,

        /// Legend labels, one per file.
        #[arg(long, value_delimiter = ',')]
        labels: Vec<String>,

        /// Output path; `.json` writes the figure document, anything else HTML.
        #[arg(long, default_value = "chart.html")]
        out: PathBuf,
    },
    /// Generate text from a prompt.
    Ask {
        prompt: String,

        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// S3 object transfer.
    S3 {
        /// Path-style endpoint, e.g. http://localhost:9000.
        #[arg(long)]
        endpoint: Option<String>,

        #[command(subcommand)]
        action: S3Action,
    },
    /// FRED series observations.
    Fred {
        series_id: String,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,

        #[command(flatten)]
        save: SaveArgs,
    },
    /// BLS monthly series, one column per id.
    Bls {
        #[arg(required = true)]
        series_ids: Vec<String>,

        /// Defaults to ten years before --end-year.
        #[arg(long)]
        start_year: Option<i32>,

        /// Defaults to the current year.
        #[arg(long)]
        end_year: Option<i32>,

        #[command(flatten)]
        save: SaveArgs,
    },
    /// Random `date`/`value` frame over the last 100 days.
    Dummy {
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        save: SaveArgs,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print one value. Secret-looking keys are masked unless --reveal.
    Get {
        section: String,
        key: String,

        #[arg(long, default_value_t = false)]
        reveal: bool,
    },
    /// List sections and keys with masked values.
    List,
}

#[derive(Subcommand)]
enum AlpacaAction {
    Account,
    Positions,
    /// Submit a day market order.
    Order {
        symbol: String,
        qty: f64,
        side: Side,
    },
    /// Latest trade for a symbol.
    Trade { symbol: String },
}

#[derive(Subcommand)]
enum S3Action {
    /// Download an object to a file, or print it as a frame with --format.
    Get {
        bucket: String,
        key: String,

        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long)]
        format: Option<FileFormat>,
    },
    /// Upload a local file.
    Put {
        bucket: String,
        key: String,
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum Analysis {
    /// Summary statistics of the first column; --forecast scales them.
    Describe {
        #[arg(long)]
        forecast: Option<f64>,
    },
    /// Each column as a share of the row total.
    Weights,
    /// Last value per period: quarter or year.
    Resample { period: Period },
    Corr {
        a: String,
        b: String,

        #[arg(long)]
        window: Option<usize>,
    },
    Cov {
        a: String,
        b: String,

        #[arg(long)]
        window: Option<usize>,
    },
    /// Engle-Granger cointegration p-value.
    Coint { a: String, b: String },
    /// Coefficient of variation.
    Cv {
        column: String,

        #[arg(long)]
        window: Option<usize>,
    },
    Zscore {
        column: String,

        #[arg(allow_hyphen_values = true)]
        value: f64,

        #[arg(long)]
        window: Option<usize>,
    },
    /// Trend of the first column; with --window adds a rolling slope column.
    Slope {
        #[arg(long)]
        window: Option<usize>,
    },
    /// Percent change over `horizon` rows.
    PctChange {
        #[arg(default_value_t = 1)]
        horizon: usize,

        /// Output only the change columns.
        #[arg(long, default_value_t = false)]
        keep_only: bool,
    },
}

#[derive(Args)]
struct SaveArgs {
    /// Also save the frame under <dir>/YYYY/MM/DD/.
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// parquet or csv.
    #[arg(long, default_value = "parquet")]
    save_format: FileFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum Broker {
    Ib,
    Alpaca,
}

#[derive(Clone, Copy, ValueEnum)]
enum Store {
    Redshift,
    Mysql,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlotKind {
    Line,
    Bar,
    Scatter,
    /// Single-series summary with yearly highs and lows.
    Summary,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = match &cli.auth {
        Some(path) => ConfigLoader::from_file(path)?,
        None => ConfigLoader::from_default_location()?,
    };

    match cli.command {
        Commands::Config { action } => run_config(&config, action),
        Commands::Bars {
            symbol,
            start,
            end,
            broker,
            timeframe,
            save,
        } => run_bars(&config, &symbol, start, end, broker, &timeframe, &save),
        Commands::Quote { symbol } => run_quote(&config, &symbol),
        Commands::Alpaca { action } => run_alpaca(&config, action),
        Commands::Query {
            store,
            sql,
            write,
            pool,
            save,
        } => run_query(&config, store, &sql, write, pool, &save),
        Commands::Analyze { file, op, save } => run_analyze(&file, op, &save),
        Commands::Plot {
            files,
            kind,
            x,
            y,
            title,
            labels,
            out,
        } => run_plot(&files, kind, x, y, &title, labels, &out),
        Commands::Ask { prompt, max_tokens } => {
            let genai = GenAi::new(OpenAiCredentials::from_loader(&config)?)?;
            println!("{}", genai.generate_text(&prompt, max_tokens)?);
            Ok(())
        }
        Commands::S3 { endpoint, action } => run_s3(&config, endpoint, action),
        Commands::Fred {
            series_id,
            start,
            end,
            save,
        } => {
            let fred = Fred::new(FredCredentials::from_loader(&config)?)?;
            let frame = fred.series(&series_id, start, end)?;
            emit(&series_id, frame.to_dataframe()?, &save)
        }
        Commands::Bls {
            series_ids,
            start_year,
            end_year,
            save,
        } => {
            let end_year = end_year.unwrap_or_else(|| Local::now().year());
            let start_year = start_year.unwrap_or(end_year - 10);
            if start_year > end_year {
                bail!("--start-year {start_year} is after --end-year {end_year}");
            }
            let bls = Bls::new(BlsCredentials::from_loader(&config)?)?;
            let frame = bls.series(&series_ids, start_year, end_year)?;
            emit("bls", frame.to_dataframe()?, &save)
        }
        Commands::Dummy { seed, save } => {
            let frame = DataAnalytics::dummy_value(seed)?;
            emit("dummy", frame.to_dataframe()?, &save)
        }
    }
}

// ── Config ───────────────────────────────────────────────────────────

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    ["password", "secret", "token", "key"]
        .iter()
        .any(|marker| key.contains(marker))
}

fn display_value(key: &str, value: &str, reveal: bool) -> String {
    if reveal || !is_secret_key(key) {
        value.to_string()
    } else {
        mask(value)
    }
}

fn run_config(config: &ConfigLoader, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get {
            section,
            key,
            reveal,
        } => {
            let value = config.require(&section, &key)?;
            println!("{}", display_value(&key, &value, reveal));
        }
        ConfigAction::List => {
            match config.path() {
                Some(path) => println!("Auth file: {}", path.display()),
                None => println!("Auth file: (none)"),
            }
            for section in config.sections() {
                println!("[{section}]");
                for key in config.keys(section) {
                    let value = config.get(section, key).unwrap_or_default();
                    println!("  {key:<20} {}", display_value(key, &value, false));
                }
            }
        }
    }
    Ok(())
}

// ── Brokers ──────────────────────────────────────────────────────────

fn run_bars(
    config: &ConfigLoader,
    symbol: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    broker: Broker,
    timeframe: &str,
    save: &SaveArgs,
) -> Result<()> {
    let end = end.unwrap_or_else(|| Local::now().date_naive());
    let start = match start {
        Some(s) => s,
        None => end
            .with_year(end.year() - 1)
            .context("cannot default --start for this --end")?,
    };
    if start > end {
        bail!("--start {start} is after --end {end}");
    }

    let df = match broker {
        Broker::Ib => {
            let ib = IbClient::connect(&IbCredentials::from_loader(config)?)?;
            let df = ib.historical_daily_bars(symbol, start, end)?;
            ib.disconnect()?;
            df
        }
        Broker::Alpaca => {
            let alpaca = Alpaca::new(AlpacaCredentials::from_loader(config)?)?;
            alpaca.bars(symbol, timeframe, start, end)?
        }
    };
    if df.height() == 0 {
        println!("No bars for {symbol} between {start} and {end}.");
        return Ok(());
    }
    emit(symbol, df, save)
}

fn run_quote(config: &ConfigLoader, symbol: &str) -> Result<()> {
    let ib = IbClient::connect(&IbCredentials::from_loader(config)?)?;
    let quote = ib.stock_quote(symbol)?;
    ib.disconnect()?;

    println!("=== {symbol} ===");
    println!("Last:   {:.2}", quote.last);
    println!("Open:   {:.2}", quote.open);
    println!("High:   {:.2}", quote.high);
    println!("Low:    {:.2}", quote.low);
    println!("Close:  {:.2}", quote.close);
    Ok(())
}

fn run_alpaca(config: &ConfigLoader, action: AlpacaAction) -> Result<()> {
    let alpaca = Alpaca::new(AlpacaCredentials::from_loader(config)?)?;
    match action {
        AlpacaAction::Account => {
            let account = alpaca.account()?;
            println!("Account:      {} ({})", account.id, account.status);
            println!("Cash:         {:.2} {}", account.cash, account.currency);
            println!("Equity:       {:.2}", account.equity);
            println!("Buying power: {:.2}", account.buying_power);
        }
        AlpacaAction::Positions => {
            let positions = alpaca.positions()?;
            if positions.is_empty() {
                println!("No open positions.");
            }
            for p in positions {
                println!(
                    "{:<8} {:>10.2} @ {:>10.2}  value {:>12.2}  {}",
                    p.symbol, p.qty, p.avg_entry_price, p.market_value, p.side
                );
            }
        }
        AlpacaAction::Order { symbol, qty, side } => {
            let order = alpaca.submit_market_order(&symbol, qty, side)?;
            println!("Order {} {} {} ({})", order.id, order.side, order.symbol, order.status);
        }
        AlpacaAction::Trade { symbol } => {
            let trade = alpaca.latest_trade(&symbol)?;
            println!("{symbol} {:.2} x {} at {}", trade.price, trade.size, trade.time);
        }
    }
    Ok(())
}

// ── SQL ──────────────────────────────────────────────────────────────

fn run_query(
    config: &ConfigLoader,
    store: Store,
    sql: &str,
    write: bool,
    pool: bool,
    save: &SaveArgs,
) -> Result<()> {
    let db: Box<dyn SqlStore> = match store {
        Store::Redshift => Box::new(Redshift::connect(&RedshiftCredentials::from_loader(config)?, pool)?),
        Store::Mysql => Box::new(MySql::connect(&MySqlCredentials::from_loader(config)?, pool)?),
    };
    if write {
        let affected = db.write_query(sql)?;
        println!("{affected} row(s) affected.");
        return Ok(());
    }
    emit("query", db.read_query(sql)?, save)
}

// ── Analytics ────────────────────────────────────────────────────────

fn load_frame(path: &Path) -> Result<TimeFrame> {
    let format = format_of(path)?;
    let df = DataLoader::default()
        .load_from_local(path, format)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(TimeFrame::from_dataframe(&df)?)
}

/// Print a scalar, or turn a rolling series into a frame on the source index.
fn measure_output(frame: &TimeFrame, label: &str, measure: Measure) -> Result<Option<DataFrame>> {
    match measure {
        Measure::Value(v) => {
            println!("{label}: {v:.6}");
            Ok(None)
        }
        Measure::Rolling(values) => {
            let out = TimeFrame::new(
                frame.index_name(),
                frame.index().to_vec(),
                vec![(label.to_string(), values)],
            )?;
            Ok(Some(out.to_dataframe()?))
        }
    }
}

fn run_analyze(file: &Path, op: Analysis, save: &SaveArgs) -> Result<()> {
    let analytics = DataAnalytics::new(load_frame(file)?);
    let frame = analytics.frame();

    let output = match op {
        Analysis::Describe { forecast } => {
            let description = analytics.describe()?;
            match forecast {
                Some(input) => {
                    let rows = description.forecast(input);
                    Some(forecast_to_dataframe(&description.column, &rows)?)
                }
                None => Some(description.to_dataframe()?),
            }
        }
        Analysis::Weights => Some(analytics.pct_weights()?.to_dataframe()?),
        Analysis::Resample { period } => Some(analytics.filter_period(period)?.to_dataframe()?),
        Analysis::Corr { a, b, window } => {
            measure_output(frame, &format!("corr_{a}_{b}"), analytics.correlation(&a, &b, window)?)?
        }
        Analysis::Cov { a, b, window } => {
            measure_output(frame, &format!("cov_{a}_{b}"), analytics.covariance(&a, &b, window)?)?
        }
        Analysis::Coint { a, b } => {
            println!("cointegration p-value: {:.6}", analytics.cointegration_pvalue(&a, &b)?);
            None
        }
        Analysis::Cv { column, window } => measure_output(
            frame,
            &format!("cv_{column}"),
            analytics.coefficient_of_variation(&column, window)?,
        )?,
        Analysis::Zscore {
            column,
            value,
            window,
        } => measure_output(
            frame,
            &format!("z_{column}"),
            analytics.z_score(&column, value, window)?,
        )?,
        Analysis::Slope { window: None } => {
            let fit = analytics.slope()?;
            println!("Slope:      {:.6}", fit.slope);
            println!("Intercept:  {:.6}", fit.intercept);
            println!("R:          {:.6}", fit.r_value);
            None
        }
        Analysis::Slope { window: Some(w) } => Some(analytics.add_slope_column(w)?.to_dataframe()?),
        Analysis::PctChange { horizon, keep_only } => {
            Some(analytics.perc_change(horizon, keep_only)?.to_dataframe()?)
        }
    };

    match output {
        Some(df) => {
            let name = file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("analysis");
            emit(name, df, save)
        }
        None => Ok(()),
    }
}

// ── Charts ───────────────────────────────────────────────────────────

fn run_plot(
    files: &[PathBuf],
    kind: PlotKind,
    x: Option<String>,
    y: Option<String>,
    title: &str,
    labels: Vec<String>,
    out: &Path,
) -> Result<()> {
    let frames = files.iter().map(|f| load_frame(f)).collect::<Result<Vec<_>>>()?;

    let figure = match kind {
        PlotKind::Summary => {
            let [frame] = frames.as_slice() else {
                bail!("summary plots take exactly one file, got {}", frames.len());
            };
            QuickPlot::prepare_figure(frame, title)?
        }
        PlotKind::Line | PlotKind::Bar | PlotKind::Scatter => {
            let x = x.unwrap_or_else(|| frames[0].index_name().to_string());
            let y = match y {
                Some(y) => y,
                None => frames[0].first_column()?.0.to_string(),
            };
            let labels = (!labels.is_empty()).then_some(labels);
            let plot = QuickPlot::new(frames, labels)?;
            match kind {
                PlotKind::Bar => plot.plot_bar(title, &x, &y)?,
                PlotKind::Scatter => plot.plot_scatter(title, &x, &y)?,
                _ => plot.plot_line(title, &x, &y)?,
            }
        }
    };

    match out.extension().and_then(|e| e.to_str()) {
        Some("json") => figure.write_json(out)?,
        _ => figure.write_html(out)?,
    }
    println!("Wrote {}", out.display());
    Ok(())
}

// ── S3 ───────────────────────────────────────────────────────────────

fn run_s3(config: &ConfigLoader, endpoint: Option<String>, action: S3Action) -> Result<()> {
    let mut s3 = S3Client::new(AwsCredentials::from_loader(config)?)?;
    if let Some(endpoint) = endpoint {
        s3 = s3.with_endpoint(endpoint);
    }

    match action {
        S3Action::Get {
            bucket,
            key,
            out: _,
            format: Some(format),
        } => {
            let df = DataLoader::with_s3(s3).load_from_s3(&bucket, &key, format)?;
            println!("{df}");
        }
        S3Action::Get {
            bucket,
            key,
            out,
            format: None,
        } => {
            let bytes = s3.get_object(&bucket, &key)?;
            let out = match out {
                Some(path) => path,
                None => PathBuf::from(key.rsplit('/').next().unwrap_or(&key)),
            };
            std::fs::write(&out, &bytes).with_context(|| format!("writing {}", out.display()))?;
            println!("Downloaded s3://{bucket}/{key} to {} ({} bytes)", out.display(), bytes.len());
        }
        S3Action::Put { bucket, key, file } => {
            let body = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let size = body.len();
            s3.put_object(&bucket, &key, body)?;
            println!("Uploaded {} to s3://{bucket}/{key} ({size} bytes)", file.display());
        }
    }
    Ok(())
}

// ── Output ───────────────────────────────────────────────────────────

fn emit(name: &str, df: DataFrame, save: &SaveArgs) -> Result<()> {
    println!("{df}");
    if let Some(dir) = &save.save_dir {
        let paths = DataSaver::new(dir).save(&[(name, df)], save.save_format)?;
        for path in paths {
            println!("Saved: {}", path.display());
        }
    }
    Ok(())
}
