use clap::{App, Arg, ArgMatches, SubCommand};
use pktring::{
    burst::{burst_receive, burst_transmit, QueueId, VirtualPort},
    config::{default_config, load_config, RuntimeConfig},
    cycles::Stopwatch,
    error::MbufError,
    mbuf::{Mbuf, Mempool, MempoolConfig},
    ring::{Ring, RingConfig},
    Result,
};
use std::{str::FromStr, sync::Barrier, thread, time::Instant};

fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("pktring-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("pktring ring and mbuf pool tool")
        .arg(
            Arg::with_name("config")
                .short("f")
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .global(true)
                .takes_value(true),
        )
        .subcommand(SubCommand::with_name("config").about("Print the effective configuration"))
        .subcommand(
            SubCommand::with_name("ring")
                .about("Ring throughput test")
                .arg(
                    Arg::with_name("mode")
                        .short("m")
                        .long("mode")
                        .value_name("MODE")
                        .help("Ring mode")
                        .possible_values(&["spsc", "mpmc"])
                        .default_value("spsc")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("threads")
                        .short("t")
                        .long("threads")
                        .value_name("THREADS")
                        .help("Producer threads (mpmc only)")
                        .default_value("4")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("operations")
                        .short("o")
                        .long("operations")
                        .value_name("OPS")
                        .help("Items per producer")
                        .default_value("1000000")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("pool")
                .about("Mbuf alloc/clone/free churn")
                .arg(
                    Arg::with_name("threads")
                        .short("t")
                        .long("threads")
                        .value_name("THREADS")
                        .help("Worker threads")
                        .default_value("4")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("operations")
                        .short("o")
                        .long("operations")
                        .value_name("OPS")
                        .help("Allocations per worker")
                        .default_value("100000")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("burst")
                .about("Loopback port TX/RX test")
                .arg(
                    Arg::with_name("packets")
                        .short("p")
                        .long("packets")
                        .value_name("PACKETS")
                        .help("Packets per queue")
                        .default_value("100000")
                        .takes_value(true),
                ),
        )
        .subcommand(SubCommand::with_name("info").about("Show version information"))
        .get_matches();

    let config = match matches.value_of("config") {
        Some(path) => load_config(path)?,
        None => default_config(),
    };

    match matches.subcommand() {
        ("config", Some(_)) => show_config(&config),
        ("ring", Some(ring_matches)) => handle_ring_command(&config, ring_matches),
        ("pool", Some(pool_matches)) => handle_pool_command(&config, pool_matches),
        ("burst", Some(burst_matches)) => handle_burst_command(&config, burst_matches),
        ("info", Some(_)) => show_info(),
        _ => {
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

fn parse_arg<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    matches
        .value_of(name)
        .ok_or_else(|| MbufError::invalid_parameter(name, "Missing value"))?
        .parse()
        .map_err(|_| MbufError::invalid_parameter(name, "Invalid number"))
}

fn show_config(config: &RuntimeConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

fn handle_ring_command(config: &RuntimeConfig, matches: &ArgMatches) -> Result<()> {
    let operations: u64 = parse_arg(matches, "operations")?;

    match matches.value_of("mode") {
        Some("mpmc") => {
            let threads: u64 = parse_arg(matches, "threads")?;
            run_mpmc(&config.ring, threads, operations)
        }
        _ => run_spsc(&config.ring, operations),
    }
}

fn run_spsc(ring_config: &RingConfig, operations: u64) -> Result<()> {
    let ring: Ring<u64> = Ring::new(ring_config.clone().spsc())?;
    println!(
        "SPSC ring {}: capacity {}, size {}, {} items",
        ring.name(),
        ring.capacity(),
        ring.size(),
        operations
    );

    let start = Instant::now();
    let watch = Stopwatch::start();
    let mut checksum = 0u64;

    thread::scope(|s| -> Result<()> {
        let producer = ring.producer()?;
        let consumer = ring.consumer()?;

        s.spawn(move || {
            for i in 0..operations {
                let mut item = i;
                while let Err(back) = producer.enqueue(item) {
                    item = back;
                    std::hint::spin_loop();
                }
            }
        });

        let mut received = 0;
        let mut batch = Vec::with_capacity(32);
        while received < operations {
            let n = consumer.dequeue_burst(&mut batch, 32) as u64;
            if n == 0 {
                std::hint::spin_loop();
                continue;
            }
            received += n;
            checksum = batch.drain(..).fold(checksum, u64::wrapping_add);
        }
        Ok(())
    })?;

    let elapsed = start.elapsed();
    println!("\nResults:");
    println!("  Checksum: {}", checksum);
    println!("  Total time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
    println!("  Throughput: {:.0} items/sec", operations as f64 / elapsed.as_secs_f64());
    println!("  Cycles/item: {:.1}", watch.elapsed() as f64 / operations as f64);
    Ok(())
}

fn run_mpmc(ring_config: &RingConfig, threads: u64, operations: u64) -> Result<()> {
    let ring: Ring<u64> = Ring::new(ring_config.clone())?;
    let total = threads * operations;
    println!(
        "MPMC ring {}: capacity {}, {} producers x {} items",
        ring.name(),
        ring.capacity(),
        threads,
        operations
    );

    let barrier = Barrier::new(threads as usize + 1);
    let start = Instant::now();
    let mut received = 0u64;

    thread::scope(|s| {
        for worker in 0..threads {
            let ring = &ring;
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                let mut batch = Vec::with_capacity(32);
                for i in 0..operations {
                    batch.push(worker * operations + i);
                    if batch.len() == 32 || i + 1 == operations {
                        while !batch.is_empty() {
                            if ring.mp_enqueue_burst(&mut batch) == 0 {
                                std::hint::spin_loop();
                            }
                        }
                    }
                }
            });
        }

        barrier.wait();
        let mut batch = Vec::with_capacity(64);
        while received < total {
            let n = ring.mc_dequeue_burst(&mut batch, 64) as u64;
            received += n;
            batch.clear();
            if n == 0 {
                std::hint::spin_loop();
            }
        }
    });

    let elapsed = start.elapsed();
    println!("\nResults:");
    println!("  Items received: {}", received);
    println!("  Total time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
    println!("  Throughput: {:.0} items/sec", total as f64 / elapsed.as_secs_f64());
    Ok(())
}

fn handle_pool_command(config: &RuntimeConfig, matches: &ArgMatches) -> Result<()> {
    let threads: usize = parse_arg(matches, "threads")?;
    let operations: usize = parse_arg(matches, "operations")?;

    let pool = Mempool::new(config.mempool.clone())?;
    println!(
        "Mempool {}: {} mbufs, data room {}, slot size {}",
        pool.name(),
        pool.capacity(),
        pool.data_room(),
        pool.slot_size()
    );

    let start = Instant::now();
    thread::scope(|s| {
        for worker in 0..threads {
            let pool = &pool;
            s.spawn(move || pool_churn(pool, worker, operations));
        }
    });
    let elapsed = start.elapsed();

    let stats = pool.stats();
    println!("\nResults:");
    println!("  Total time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
    println!(
        "  Allocations/sec: {:.0}",
        stats.total_allocations as f64 / elapsed.as_secs_f64()
    );
    println!("  {}", stats.summary());
    println!("  Free after run: {}/{}", pool.available(), pool.capacity());
    Ok(())
}

fn pool_churn(pool: &Mempool, worker: usize, operations: usize) {
    let stamp = (worker as u32).to_be_bytes();
    for _ in 0..operations {
        let mut mbuf = match pool.alloc() {
            Ok(mbuf) => mbuf,
            Err(_) => continue,
        };
        if mbuf.extend_from_slice(&stamp).is_err() {
            continue;
        }
        let alias = mbuf.clone();
        drop(mbuf);
        if let Err(e) = pool.release(alias) {
            log::error!("worker {}: {}", worker, e);
        }
    }
}

fn handle_burst_command(config: &RuntimeConfig, matches: &ArgMatches) -> Result<()> {
    let packets: usize = parse_arg(matches, "packets")?;

    let pool = Mempool::new(MempoolConfig {
        name: format!("{}_burst", config.mempool.name),
        ..config.mempool.clone()
    })?;
    let port: VirtualPort<Mbuf> = VirtualPort::new(&config.port)?;
    let burst_size = port.burst_size();
    println!(
        "Port {}: {} queues, burst {}, {} packets per queue",
        port.id(),
        port.nb_queues(),
        burst_size,
        packets
    );

    let start = Instant::now();
    let mut received = 0usize;
    for q in 0..port.nb_queues() as u16 {
        let tx = port.tx_queue(QueueId(q))?;
        let rx = port.rx_queue(QueueId(q))?;

        let mut sent = 0;
        while sent < packets {
            let want = burst_size.min(packets - sent).min(pool.capacity());
            let mut pkts = match pool.alloc_bulk(want) {
                Ok(pkts) => pkts,
                Err(_) => Vec::new(),
            };
            sent += burst_transmit(&tx, &mut pkts);
            // Anything the queue refused goes back to the pool here.
            drop(pkts);
            received += burst_receive(&rx, burst_size).len();
        }
        loop {
            let n = burst_receive(&rx, burst_size).len();
            if n == 0 {
                break;
            }
            received += n;
        }
    }
    let elapsed = start.elapsed();

    println!("\nResults:");
    println!("  Packets received: {}", received);
    println!("  Total time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
    println!("  {}", port.stats().summary());
    println!("  {}", pool.stats().summary());
    Ok(())
}

fn show_info() -> Result<()> {
    println!("pktring");
    println!("Version: {}", pktring::VERSION);

    println!("\nFeatures:");
    #[cfg(feature = "unchecked-refcnt")]
    println!("  - Unchecked mbuf refcount release");

    println!("\nCapabilities:");
    println!("  - Lock-free SP/MP/SC/MC ring queues");
    println!("  - Bulk and burst enqueue/dequeue");
    println!("  - Refcounted mbuf pools");
    println!("  - Loopback burst I/O port");

    Ok(())
}
