//! Built-in Rhai functions and custom types for snippets.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use ip_network::IpNetwork;
use rhai::{Dynamic, Engine, EvalAltResult};
use std::net::IpAddr;

type FnResult<T> = Result<T, Box<EvalAltResult>>;

/// Registers all built-in functions in the Rhai engine.
pub fn register_builtin_functions(engine: &mut Engine) {
    register_ip_type(engine);
    register_subnet_type(engine);
    register_time_types(engine);
    register_uuid_functions(engine);
    register_time_functions(engine);
    register_parsing_functions(engine);
    register_string_functions(engine);
    register_ip_functions(engine);
}

fn register_ip_type(engine: &mut Engine) {
    engine
        .register_type_with_name::<IpAddr>("ip")
        .register_fn("ip", |s: &str| -> FnResult<IpAddr> {
            s.parse::<IpAddr>()
                .map_err(|e| format!("invalid ip '{s}': {e}").into())
        })
        .register_fn("to_string", |ip: &mut IpAddr| ip.to_string())
        .register_fn("to_debug", |ip: &mut IpAddr| format!("ip({ip})"))
        .register_fn("==", |a: &mut IpAddr, b: IpAddr| *a == b)
        .register_fn("!=", |a: &mut IpAddr, b: IpAddr| *a != b)
        .register_fn("is_v4", |ip: &mut IpAddr| ip.is_ipv4())
        .register_fn("is_v6", |ip: &mut IpAddr| ip.is_ipv6());
}

fn register_subnet_type(engine: &mut Engine) {
    engine
        .register_type_with_name::<IpNetwork>("subnet")
        .register_fn("subnet", |s: &str| -> FnResult<IpNetwork> {
            s.parse::<IpNetwork>()
                .map_err(|e| format!("invalid subnet '{s}': {e}").into())
        })
        .register_fn("to_string", |net: &mut IpNetwork| net.to_string())
        .register_fn("to_debug", |net: &mut IpNetwork| format!("subnet({net})"))
        .register_fn("==", |a: &mut IpNetwork, b: IpNetwork| *a == b)
        .register_fn("!=", |a: &mut IpNetwork, b: IpNetwork| *a != b)
        .register_fn("contains", |net: &mut IpNetwork, ip: IpAddr| net.contains(ip))
        .register_fn("network", |net: &mut IpNetwork| net.network_address())
        .register_fn("prefix", |net: &mut IpNetwork| i64::from(net.netmask()));
}

fn register_time_types(engine: &mut Engine) {
    engine
        .register_type_with_name::<DateTime<Utc>>("time")
        .register_fn("time", |s: &str| -> FnResult<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| format!("invalid time '{s}': {e}").into())
        })
        .register_fn("now", Utc::now)
        .register_fn("to_string", |t: &mut DateTime<Utc>| {
            t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        })
        .register_fn("to_debug", |t: &mut DateTime<Utc>| {
            format!("time({})", t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        })
        .register_fn("==", |a: &mut DateTime<Utc>, b: DateTime<Utc>| *a == b)
        .register_fn("!=", |a: &mut DateTime<Utc>, b: DateTime<Utc>| *a != b)
        .register_fn("<", |a: &mut DateTime<Utc>, b: DateTime<Utc>| *a < b)
        .register_fn(">", |a: &mut DateTime<Utc>, b: DateTime<Utc>| *a > b)
        .register_fn("+", |t: &mut DateTime<Utc>, d: TimeDelta| *t + d)
        .register_fn("-", |t: &mut DateTime<Utc>, d: TimeDelta| *t - d)
        .register_fn("-", |a: &mut DateTime<Utc>, b: DateTime<Utc>| *a - b)
        .register_fn("unix_nanos", |t: &mut DateTime<Utc>| -> Dynamic {
            t.timestamp_nanos_opt().map_or(Dynamic::UNIT, Dynamic::from)
        });

    engine
        .register_type_with_name::<TimeDelta>("duration")
        .register_fn("nanoseconds", TimeDelta::nanoseconds)
        .register_fn("seconds", |s: i64| -> FnResult<TimeDelta> {
            TimeDelta::try_seconds(s).ok_or_else(|| format!("{s} seconds is out of range").into())
        })
        .register_fn("to_string", |d: &mut TimeDelta| d.to_string())
        .register_fn("to_debug", |d: &mut TimeDelta| format!("duration({d})"))
        .register_fn("==", |a: &mut TimeDelta, b: TimeDelta| *a == b)
        .register_fn("!=", |a: &mut TimeDelta, b: TimeDelta| *a != b)
        .register_fn("+", |a: &mut TimeDelta, b: TimeDelta| *a + b)
        .register_fn("-", |a: &mut TimeDelta, b: TimeDelta| *a - b)
        .register_fn("as_nanos", |d: &mut TimeDelta| -> Dynamic {
            d.num_nanoseconds().map_or(Dynamic::UNIT, Dynamic::from)
        });
}

fn register_uuid_functions(engine: &mut Engine) {
    engine.register_fn("uuid", || uuid::Uuid::new_v4().to_string());
}

fn register_time_functions(engine: &mut Engine) {
    // ISO 8601 string, for snippets that want text rather than a time value
    engine.register_fn("timestamp", || Utc::now().to_rfc3339());

    engine.register_fn("unix_timestamp", || Utc::now().timestamp());

    engine.register_fn("unix_timestamp_ms", || Utc::now().timestamp_millis());
}

fn register_parsing_functions(engine: &mut Engine) {
    engine.register_fn("parse_int", |s: &str| -> Dynamic {
        s.parse::<i64>().map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });

    engine.register_fn("parse_float", |s: &str| -> Dynamic {
        s.parse::<f64>().map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });

    engine.register_fn("parse_bool", |s: &str| -> Dynamic {
        match s.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Dynamic::from(true),
            "false" | "0" | "no" | "off" => Dynamic::from(false),
            _ => Dynamic::UNIT,
        }
    });
}

fn register_string_functions(engine: &mut Engine) {
    // Nothing here may reuse a name of Rhai's own string methods, or
    // `s.trim();` stops trimming in place.
    engine.register_fn("join", |arr: rhai::Array, delimiter: &str| -> String {
        arr.iter()
            .filter_map(|v| v.clone().into_string().ok())
            .collect::<Vec<_>>()
            .join(delimiter)
    });
}

fn register_ip_functions(engine: &mut Engine) {
    engine.register_fn("is_private_ip", |ip: &str| -> bool {
        ip.parse::<IpAddr>().map(is_private).unwrap_or(false)
    });
    engine.register_fn("is_private_ip", |ip: IpAddr| is_private(ip));

    engine.register_fn("is_valid_ip", |ip: &str| -> bool {
        ip.parse::<IpAddr>().is_ok()
    });

    engine.register_fn("is_ipv4", |ip: &str| -> bool {
        ip.parse::<IpAddr>()
            .map(|addr| addr.is_ipv4())
            .unwrap_or(false)
    });

    engine.register_fn("is_ipv6", |ip: &str| -> bool {
        ip.parse::<IpAddr>()
            .map(|addr| addr.is_ipv6())
            .unwrap_or(false)
    });

    engine.register_fn("normalize_ip", |ip: &str| -> Dynamic {
        ip.parse::<IpAddr>()
            .map(|addr| Dynamic::from(addr.to_string()))
            .unwrap_or(Dynamic::UNIT)
    });
}

fn is_private(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_private()),
    }
}
