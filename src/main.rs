// src/main.rs
use clap::Parser;
use ton_miner_rs::{MinerError, cli, config, utils};

/// Main entry point for the miner
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(MinerError)` if any operation fails
///
/// # Flow
/// 1. Parses command line arguments
/// 2. Delegates to appropriate subcommand handler
/// 3. Propagates any errors upward
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Run(opts) => start_mining(opts),
        cli::Action::Info => show_devices(),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Starts the mining operation with given configuration options
///
/// # Arguments
/// * `opts` - Command line options for mining operation
///
/// # Operations
/// 1. Initializes logging and loads/merges configuration
/// 2. Selects devices and builds their search programs (fatal on error)
/// 3. Checks pool connectivity and installs the initial task (fatal)
/// 4. Spawns device workers, reporter workers and background fetchers
/// 5. Runs until the process is terminated
#[cfg(feature = "gpu")]
fn start_mining(opts: cli::RunOptions) -> Result<(), MinerError> {
    use crossbeam_channel::unbounded;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tokio::runtime::Runtime;
    use ton_miner_rs::miner::BenchmarkStore;
    use ton_miner_rs::network::{fetcher, submitter};
    use ton_miner_rs::{MinerContext, PoolClient, StatsReporter, Worker, accel};

    utils::init_logging(opts.debug, opts.silent);

    let mut config = config::load_or_default(&opts.config)?;
    if opts.pool.is_some() {
        config.pool_url = opts.pool;
    }
    if opts.wallet.is_some() {
        config.wallet = opts.wallet;
    }
    if opts.platform.is_some() {
        config.platform = opts.platform;
    }
    if opts.device.is_some() {
        config.device = opts.device;
    }
    if opts.threads.is_some() {
        config.threads = opts.threads;
    }
    if opts.stats {
        config.stats = true;
    }
    let (pool_url, wallet) = config.require_pool()?;

    let devices = accel::opencl::select_devices(config.platform, config.device)?;
    if devices.is_empty() {
        return Err(MinerError::DeviceError(
            "no OpenCL devices found, check your graphics card drivers".to_string(),
        ));
    }
    log::info!("Total devices: {}", devices.len());

    let kernel_source = accel::load_kernel_source(&config.kernel_dir)?;

    let (share_tx, share_rx) = unbounded();
    let ctx = Arc::new(MinerContext::new(devices.len(), share_tx));
    let pool = Arc::new(PoolClient::new(pool_url, wallet.clone())?);

    log::info!(
        "starting ton_miner-rs {} on pool {} wallet {} ...",
        env!("CARGO_PKG_VERSION"),
        pool.base(),
        wallet
    );

    let rt = Runtime::new()?;
    rt.block_on(async {
        pool.check_wallet().await?;
        fetcher::fetch_initial_task(&pool, &ctx).await
    })?;

    let store = Arc::new(BenchmarkStore::load(&config.benchmark_file));
    for (index, spec) in devices.iter().enumerate() {
        let accel = accel::opencl::open_device(spec, &kernel_source)?;
        let worker = Worker::new(
            Box::new(accel),
            ctx.clone(),
            store.clone(),
            index,
            config.threads,
        );
        std::thread::spawn(move || worker.run());
    }

    let stats_path = config.stats.then(|| config.stats_file.clone());
    StatsReporter::new(ctx.clone(), Duration::from_secs(10), stats_path).start();

    rt.block_on(async {
        let push_live = Arc::new(AtomicBool::new(false));
        submitter::spawn_reporters(pool.clone(), ctx.clone(), share_rx);
        tokio::spawn(fetcher::devfee_jobs(pool.clone(), ctx.clone()));
        tokio::spawn(fetcher::push_jobs(
            pool.clone(),
            ctx.clone(),
            push_live.clone(),
        ));

        tokio::select! {
            _ = fetcher::poll_jobs(pool, ctx.clone(), push_live) => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("Exiting...");
                ctx.stop();
            }
        }
        Ok(())
    })
}

#[cfg(not(feature = "gpu"))]
fn start_mining(opts: cli::RunOptions) -> Result<(), MinerError> {
    utils::init_logging(opts.debug, opts.silent);
    Err(MinerError::DeviceError(
        "this build has no OpenCL support; rebuild with `--features gpu`".to_string(),
    ))
}

/// Lists OpenCL platforms and devices
#[cfg(feature = "gpu")]
fn show_devices() -> Result<(), MinerError> {
    use ton_miner_rs::accel;

    println!("ton_miner-rs {}", env!("CARGO_PKG_VERSION"));
    for line in accel::opencl::list_devices()? {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(not(feature = "gpu"))]
fn show_devices() -> Result<(), MinerError> {
    Err(MinerError::DeviceError(
        "this build has no OpenCL support; rebuild with `--features gpu`".to_string(),
    ))
}

/// Generates configuration template file
///
/// # Arguments
/// * `opts` - Configuration generation options
///
/// # Operations
/// 1. Generates template content
/// 2. Writes template to specified output file
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    let template = config::generate_template();
    std::fs::write(opts.output, template)?;
    Ok(())
}
