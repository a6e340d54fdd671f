// تعریف ماژول‌های مختلف پروژه
mod chart;  // رسم نمودار
mod logger; // سیستم ثبت وقایع (Log)
mod style;  // تعریف رنگ‌ها و تم ظاهری

use data::chart::RandomUuid;
use data::{FlatState, OrderFlowChart, UserTimezone};

use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::process::ExitCode;

/// آرگومان‌های خط فرمان
#[derive(Parser, Debug)]
#[command(name = "orderflow-chart", version)]
#[command(about = "Order flow chart: bid/ask heatmap over candles, with delta metrics")]
#[command(group(ArgGroup::new("input").required(true).args(["orderflow", "state"])))]
struct Cli {
    /// CSV of order book rows: time,price,bid_size,ask_size[,candle_id][,imbalance]
    #[arg(long, requires = "ohlc")]
    orderflow: Option<PathBuf>,
    /// CSV of candles: time,open,high,low,close[,candle_id]
    #[arg(long, requires = "orderflow")]
    ohlc: Option<PathBuf>,
    /// Previously saved processed state, skips processing
    #[arg(long)]
    state: Option<PathBuf>,
    /// Write the processed state as JSON
    #[arg(long)]
    save_state: Option<PathBuf>,
    /// Write the figure as plotly JSON
    #[arg(long)]
    figure: Option<PathBuf>,
    /// Open the chart in the browser
    #[arg(long)]
    show: bool,
    /// Random identifiers for candles that come without one
    #[arg(long)]
    uuid_ids: bool,
    /// Timezone of the time axis labels
    #[arg(long, value_parser = parse_timezone)]
    timezone: Option<UserTimezone>,
    /// Candles visible when the chart opens
    #[arg(long)]
    visible_candles: Option<usize>,
    /// Remember --timezone and --visible-candles for later runs
    #[arg(long)]
    save_config: bool,
    /// Log to stdout at debug level
    #[arg(long)]
    debug: bool,
}

/// خطاهای سطح برنامه
#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error("no input, pass --orderflow and --ohlc, or --state")]
    MissingInput,
    #[error("failed to load input")]
    Load(#[from] market::Error),
    #[error("failed to read or write processed state")]
    State(#[from] data::state::StateError),
    #[error(transparent)]
    Chart(#[from] data::chart::Error),
    #[error("failed to render chart")]
    Render(#[from] chart::Error),
    #[error(transparent)]
    Config(#[from] data::InternalError),
}

fn parse_timezone(value: &str) -> Result<UserTimezone, String> {
    serde_json::from_value(serde_json::Value::from(value)).map_err(|e| e.to_string())
}

/// نقطه شروع برنامه
fn main() -> ExitCode {
    let cli = Cli::parse();

    // راه‌اندازی سیستم لاگ
    if let Err(err) = logger::setup(cli.debug) {
        eprintln!("Failed to initialize logger: {err}");
    }

    let code = match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", error_chain(&err));
            ExitCode::FAILURE
        }
    };

    log::logger().flush();
    code
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let mut config = data::load_config();
    if let Some(timezone) = cli.timezone {
        config.timezone = timezone;
    }
    if let Some(visible) = cli.visible_candles.filter(|n| *n > 0) {
        config.visible_candles = visible;
    }
    if cli.save_config {
        data::save_config(&config)?;
    }

    let chart = load_chart(cli)?;

    if let Some(path) = &cli.save_state {
        chart.to_flat()?.save(path)?;
    }

    if let Some(path) = &cli.figure
        && let Some(figure) = chart::render(&chart, &config, false)?
    {
        figure.save(path)?;
    }

    if cli.show {
        chart::render(&chart, &config, true)?;
    } else if cli.figure.is_none() {
        // بدون خروجی نمودار، فقط خلاصه داده‌ها نمایش داده می‌شود
        let state = chart.processed()?;
        let range = chart.plot_range(&config)?;
        println!(
            "{} candles, {} order rows, price window {} .. {}",
            state.candles.len(),
            state.imbalance.len(),
            range.price_bottom,
            range.price_top,
        );
    }

    Ok(())
}

fn load_chart(cli: &Cli) -> Result<OrderFlowChart, AppError> {
    if let Some(path) = &cli.state {
        log::info!("Loading processed state from {path:?}");
        return Ok(OrderFlowChart::from_flat(FlatState::load(path)?)?);
    }

    let (Some(orderflow), Some(ohlc)) = (&cli.orderflow, &cli.ohlc) else {
        return Err(AppError::MissingInput);
    };

    let rows = market::load::order_rows_from_path(orderflow)?;
    let candles = market::load::candles_from_path(ohlc)?;
    log::info!("Loaded {} order rows and {} candles", rows.len(), candles.len());

    let chart = OrderFlowChart::new(rows, candles);
    Ok(if cli.uuid_ids {
        chart.with_id_source(RandomUuid)
    } else {
        chart
    })
}

/// پیام خطا به همراه همه علت‌های آن
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn csv_inputs_come_in_pairs() {
        assert!(Cli::try_parse_from(["orderflow-chart", "--orderflow", "rows.csv"]).is_err());
        assert!(Cli::try_parse_from(["orderflow-chart", "--show"]).is_err());

        let cli = Cli::try_parse_from([
            "orderflow-chart",
            "--orderflow",
            "rows.csv",
            "--ohlc",
            "candles.csv",
            "--timezone",
            "local",
        ])
        .unwrap();
        assert_eq!(cli.timezone, Some(UserTimezone::Local));
    }

    #[test]
    fn error_chain_includes_causes() {
        let err = AppError::Chart(data::chart::Error::Processing(
            data::chart::InputError::NoCandles,
        ));

        let message = error_chain(&err);
        assert!(message.starts_with("data processing failed"));
        assert!(message.ends_with(": candle table is empty"));
    }
}
