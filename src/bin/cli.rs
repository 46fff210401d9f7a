//! cdc-touch command line interface.

use std::{process, sync::Arc};

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_t, App, Arg, ArgMatches,
};
use console::style;
use log::{debug, error, info, trace, LevelFilter};
use simplelog::*;

use cdc_touch::{self as ct, host};

fn main() {
    println!("[CT] cdc-touch v{}", crate_version!());

    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(0);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about(crate_description!())
        .long_about(
            "\n\
            cdc-touch watches the line-control signals of a USB serial port \
            and requests a reboot into the bootloader when a host opens the \
            port, sets it to 1200 baud and closes it again (the 1200-baud \
            touch).\n\
            \n\
            The port is polled only while it is present on the system. When \
            the touch is seen, cdc-touch waits for the reboot delay and then \
            exits with the reset code as its exit status, for a supervisor to \
            restart the device in update mode.\
        ",
        )
        .max_term_width(80)
        .arg(
            Arg::with_name("DEVICE_TTY")
                .help("the USB tty device to watch")
                .long_help(
                    "the USB tty device to watch; when not set, the first USB \
                     serial port found on the system is used.",
                )
                .short("t")
                .long("tty")
                .takes_value(true)
                .require_equals(true),
        )
        .arg(
            Arg::with_name("POLL_MS")
                .help("line-control poll interval in milliseconds")
                .long("poll-ms")
                .takes_value(true)
                .default_value("100")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("DELAY_MS")
                .help("delay before rebooting, in milliseconds")
                .long("delay-ms")
                .takes_value(true)
                .default_value("100")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("RESET_CODE")
                .help("reboot mode code, decimal or 0x-prefixed hex")
                .long("reset-code")
                .takes_value(true)
                .default_value("0x57")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("SCAN_MS")
                .help("serial port scan interval in milliseconds")
                .long("scan-ms")
                .takes_value(true)
                .default_value("500")
                .require_equals(true),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .get_matches();

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'cdc-touch -v -v -v' or 'cdc-touch -vvv' vs 'cdc-touch -v'
    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .unwrap();

    trace!("{:#?}", matches);

    // Arguments with default values ===========================================

    let poll_ms = millis_or_exit(&matches, "POLL_MS", "poll-ms");
    let delay_ms = millis_or_exit(&matches, "DELAY_MS", "delay-ms");
    let scan_ms = millis_or_exit(&matches, "SCAN_MS", "scan-ms");

    // The reset code becomes the exit status, so it has to fit in one.
    let reset_code_arg = matches.value_of("RESET_CODE").unwrap();
    let reset_code = parse_code(reset_code_arg).unwrap_or_else(|| {
        invalid_argument(
            "reset-code",
            reset_code_arg,
            "a decimal or 0x-prefixed hex value from 1 to 255",
        )
    });

    // END - Arguments with default values =====================================

    let mut builder = ct::SettingsBuilder::new()
        .poll_ms(poll_ms)
        .reboot_delay_ms(delay_ms)
        .reset_code(reset_code)
        .scan_ms(scan_ms);

    if let Some(path) = matches.value_of("DEVICE_TTY") {
        builder = builder.path(path);
    }
    let settings = builder.finalize();

    // Bring up the trigger ====================================================

    // The module stays inactive unless the endpoint can be resolved.
    let path = match host::resolve_endpoint(&settings) {
        Ok(path) => path,
        Err(e) => {
            error!("{}", e);
            println!("{}: {}", style("error").red(), e);
            process::exit(1);
        }
    };
    println!("👀 Watching {} for a 1200-baud touch", style(&path).green());

    let (queue, _watcher) = match start(&path, &settings) {
        Ok(running) => running,
        Err(e) => {
            error!("failed to start: {}", e);
            process::exit(1);
        }
    };
    info!("bootloader trigger running on {}", path);

    // The watcher keeps a sender alive, so this only returns if the queue
    // thread dies.
    let status = match queue.join() {
        Ok(_) => 0,
        Err(e) => {
            error!("{}", e);
            1
        }
    };
    debug!("exit code: {}", status);
    process::exit(status);
}

/// Register the endpoint, then start the work queue and the port watcher
/// feeding it.
fn start(
    path: &str,
    settings: &ct::Settings,
) -> ct::Result<(ct::WorkQueue, host::PortWatcher)> {
    let trigger = ct::DeferredReboot::new(settings, Arc::new(host::ExitReboot));
    let mut registry = ct::Registry::new(settings.clone(), trigger);
    registry.register(path, Box::new(host::SerialLineControl::new(path)))?;
    let queue = ct::WorkQueue::start(registry, settings.mailbox_capacity)?;
    let watcher = host::PortWatcher::start(path, settings, queue.sender())?;
    Ok((queue, watcher))
}

fn millis_or_exit(matches: &ArgMatches, arg: &str, name: &str) -> u64 {
    value_t!(matches.value_of(arg), u64).unwrap_or_else(|e| {
        debug!("{}", e);
        // It's safe to unwrap, the argument has a default value.
        invalid_argument(
            name,
            matches.value_of(arg).unwrap(),
            "a number of milliseconds",
        )
    })
}

fn invalid_argument(name: &str, value: &str, expected: &str) -> ! {
    println!("{}", invalid_argument_message(name, value, expected));
    process::exit(-1);
}

fn invalid_argument_message(name: &str, value: &str, expected: &str) -> String {
    format!(
        "{}: `{}` needs to be {}\n   {} `{}` is not a valid value",
        style("error").red(),
        style(name).cyan(),
        expected,
        style("-->").cyan(),
        style(value).on_red()
    )
}

fn parse_code(value: &str) -> Option<u32> {
    let code = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }?;
    if (1..=host::MAX_EXIT_CODE).contains(&code) {
        Some(code)
    } else {
        None
    }
}

#[test]
fn parses_decimal_and_hex_codes() {
    assert_eq!(parse_code("87"), Some(0x57));
    assert_eq!(parse_code("0x57"), Some(0x57));
    assert_eq!(parse_code("0X4e"), Some(0x4e));
    assert_eq!(parse_code("0xzz"), None);
    assert_eq!(parse_code("uf2"), None);
}

#[test]
fn rejects_codes_that_do_not_fit_an_exit_status() {
    assert_eq!(parse_code("255"), Some(255));
    assert_eq!(parse_code("0x100"), None);
    assert_eq!(parse_code("0"), None);
}

#[test]
fn invalid_argument_shows_the_value() {
    console::set_colors_enabled(false);
    let message = invalid_argument_message("poll-ms", "fast", "a number of milliseconds");
    assert!(message.contains("`poll-ms` needs to be a number of milliseconds"));
    assert!(message.contains("`fast` is not a valid value"));
}
