//! Prints tracker, button, and analog events from a VRPN server.
//!
//! Run with:
//!   cargo run --example tracker-console -- <host> [device]
//!
//! The pump runs on a dedicated reader thread that reconnects whenever the
//! control socket drops; decoded events are drained on the main thread.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use vrpnio::client::Connection;
use vrpnio::registry::Registry;
use vrpnio::remote::{AnalogRemote, ButtonRemote, Remote, TrackerRemote};

const VRPN_PORT: u16 = 3883;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let device = args.next().unwrap_or_else(|| "Tracker0".to_string());

    let registry = Arc::new(Registry::new());
    let mut tracker = TrackerRemote::new(device.clone(), Arc::clone(&registry));
    let mut button = ButtonRemote::new(device.clone(), Arc::clone(&registry));
    let mut analog = AnalogRemote::new(device.clone(), Arc::clone(&registry));
    tracker.register();
    button.register();
    analog.register();

    let running = Arc::new(AtomicBool::new(true));
    let pump_running = Arc::clone(&running);
    let pump = thread::spawn(move || {
        let mut conn = Connection::new(host, VRPN_PORT, Ipv4Addr::UNSPECIFIED, registry);
        while pump_running.load(Ordering::Relaxed) {
            if !conn.connected() {
                eprintln!("connecting…");
                if let Err(err) = conn.reconnect(3, Duration::from_secs(1)) {
                    eprintln!("connect failed: {err}");
                }
                if !conn.connected() {
                    thread::sleep(Duration::from_secs(1));
                    continue;
                }
            }
            if let Err(err) = conn.read_messages() {
                eprintln!("connection lost: {err}");
            }
            thread::sleep(Duration::from_millis(1));
        }
    });

    // Drain events until the process is killed.
    loop {
        for event in tracker.events().try_iter() {
            println!("tracker: {:?}", event.record);
        }
        for event in button.events().try_iter() {
            println!("button: {:?}", event.record);
        }
        for event in analog.events().try_iter() {
            println!("analog: {:?}", event.channels);
        }
        thread::sleep(Duration::from_millis(10));

        if pump.is_finished() {
            running.store(false, Ordering::Relaxed);
            break;
        }
    }

    pump.join().expect("pump thread panicked");
    Ok(())
}
