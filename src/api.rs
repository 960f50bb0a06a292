use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, UdpSocket};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{info, warn};
use mdns_sd::{ServiceDaemon, ServiceInfo};
use serde::Serialize;
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::control::{Command, CommandError, ControlHandle};
use crate::runtime::ShutdownToken;
use crate::timer::TimerSpec;

pub const MDNS_SERVICE_TYPE: &str = "_matrixclock._tcp.local.";

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub mdns_enabled: bool,
    pub mdns_instance: String,
}

pub struct ApiServer {
    stop: Arc<AtomicBool>,
    http_join: Option<JoinHandle<()>>,
    mdns: Option<ServiceDaemon>,
}

impl ApiServer {
    pub fn start(
        config: ApiServerConfig,
        control: ControlHandle,
        shutdown: ShutdownToken,
    ) -> Result<Self> {
        let bind = format!("{}:{}", config.bind_addr, config.port);
        let server = Server::http(&bind)
            .map_err(|err| anyhow!("failed to start API server on {bind}: {err}"))?;
        info!("control API listening on http://{bind}");
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let http_join = thread::spawn(move || {
            run_server_loop(server, &control, &shutdown, &stop_for_thread)
        });

        let mdns = if config.mdns_enabled {
            match start_mdns_advertisement(config.port, &config.mdns_instance) {
                Ok(daemon) => Some(daemon),
                Err(err) => {
                    warn!("mDNS advertisement disabled: {err}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            stop,
            http_join: Some(http_join),
            mdns,
        })
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.http_join.take() {
            let _ = join.join();
        }
        if let Some(mdns) = self.mdns.take() {
            let _ = mdns.shutdown();
        }
    }
}

fn run_server_loop(
    server: Server,
    control: &ControlHandle,
    shutdown: &ShutdownToken,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::Relaxed) {
        match server.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(request)) => handle_request(request, control, shutdown),
            Ok(None) => continue,
            Err(_) => continue,
        }
    }
}

fn start_mdns_advertisement(api_port: u16, instance_prefix: &str) -> Result<ServiceDaemon> {
    let daemon = ServiceDaemon::new().map_err(|err| anyhow!("could not create mDNS daemon: {err}"))?;

    let hostname = detect_hostname();
    let instance = if instance_prefix.trim().is_empty() {
        hostname.clone()
    } else {
        format!("{}-{}", instance_prefix.trim(), hostname)
    };
    let host_name = format!("{hostname}.local.");
    let mut addresses = detect_mdns_addresses();
    if addresses.is_empty() {
        addresses.push(Ipv4Addr::LOCALHOST.into());
    }

    let service = ServiceInfo::new(
        MDNS_SERVICE_TYPE,
        &instance,
        &host_name,
        addresses.as_slice(),
        api_port,
        None,
    )
    .map_err(|err| anyhow!("could not create mDNS service info: {err}"))?;
    daemon
        .register(service)
        .map_err(|err| anyhow!("could not register mDNS service: {err}"))?;
    info!("advertising {instance} as {MDNS_SERVICE_TYPE}");
    Ok(daemon)
}

fn detect_hostname() -> String {
    let candidate = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .unwrap_or_else(|| "matrixclock".to_string());
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        "matrixclock".to_string()
    } else {
        trimmed
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' {
                    ch.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect::<String>()
    }
}

fn detect_mdns_addresses() -> Vec<IpAddr> {
    let mut addresses = Vec::<IpAddr>::new();
    if let Ok(socket) = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        && socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).is_ok()
        && let Ok(local) = socket.local_addr()
    {
        let ip = local.ip();
        if ip.is_ipv4() && !ip.is_loopback() {
            addresses.push(ip);
        }
    }
    addresses.sort();
    addresses.dedup();
    addresses
}

/// What an incoming request asks for, decided before touching the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Health,
    Shutdown,
    Control(Command),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn handle_request(request: tiny_http::Request, control: &ControlHandle, shutdown: &ShutdownToken) {
    let Some(remote_addr) = request.remote_addr() else {
        let _ = send_text(request, StatusCode(400), "missing remote address");
        return;
    };
    if !is_local_network_ip(remote_addr.ip()) {
        let _ = send_text(request, StatusCode(403), "forbidden: local network only");
        return;
    }

    let url = request.url().to_string();
    let (path, query) = split_path_query(&url);
    let route = match route_request(request.method(), path, query) {
        Ok(route) => route,
        Err(RouteError::MethodNotAllowed) => {
            let _ = send_text(request, StatusCode(405), "method not allowed");
            return;
        }
        Err(RouteError::Rejected(err)) => {
            let status = status_for(&err);
            let _ = send_json(request, status, &ErrorBody { error: err.to_string() });
            return;
        }
    };

    let result = match route {
        Route::Health => send_text(request, StatusCode(200), "ok"),
        Route::Shutdown => {
            info!("shutdown requested over the control API");
            shutdown.cancel();
            send_text(request, StatusCode(202), "shutting down")
        }
        Route::Control(command) => match control.send(command) {
            Ok(reply) => send_json(request, StatusCode(200), &reply),
            Err(err) => send_json(request, status_for(&err), &ErrorBody { error: err.to_string() }),
        },
    };
    if let Err(err) = result {
        warn!("failed to answer {path}: {err:#}");
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RouteError {
    MethodNotAllowed,
    Rejected(CommandError),
}

impl From<CommandError> for RouteError {
    fn from(err: CommandError) -> Self {
        RouteError::Rejected(err)
    }
}

fn route_method(path: &str) -> Option<Method> {
    match path {
        "/healthz" | "/v1/state" | "/v1/faces" => Some(Method::Get),
        "/v1/face" | "/v1/face/clear" | "/v1/power" | "/v1/reload" | "/v1/weather/refresh"
        | "/v1/timer" | "/v1/stopwatch" | "/v1/timer/start" | "/v1/timer/pause"
        | "/v1/timer/cancel" | "/v1/timer/reset" | "/v1/shutdown" => Some(Method::Post),
        _ => None,
    }
}

fn route_request(method: &Method, path: &str, query: &str) -> Result<Route, RouteError> {
    let path = path.trim_end_matches('/');
    let expected = route_method(path)
        .ok_or_else(|| CommandError::UnknownRoute(path.to_string()))?;
    if *method != expected {
        return Err(RouteError::MethodNotAllowed);
    }

    let command = match path {
        "/healthz" => return Ok(Route::Health),
        "/v1/shutdown" => return Ok(Route::Shutdown),
        "/v1/state" => Command::Status,
        "/v1/faces" => Command::ListFaces,
        "/v1/face" => Command::SelectFace(required_param(query, "name")?),
        "/v1/face/clear" => Command::ClearOverride,
        "/v1/power" => Command::SetPower(parse_flag(&required_param(query, "on")?)?),
        "/v1/reload" => Command::Reload,
        "/v1/weather/refresh" => Command::RefreshWeather,
        "/v1/timer" => {
            let hour = optional_number(query, "hour")?;
            let minute = optional_number(query, "minute")?;
            let second = optional_number(query, "second")?;
            let spec = TimerSpec::from_hms(hour, minute, second).ok_or_else(|| {
                CommandError::InvalidDuration(format!("{hour}:{minute}:{second}"))
            })?;
            Command::CreateTimer(spec)
        }
        "/v1/stopwatch" => Command::CreateTimer(TimerSpec::Stopwatch),
        "/v1/timer/start" => Command::StartTimer,
        "/v1/timer/pause" => Command::PauseTimer,
        "/v1/timer/cancel" => Command::CancelTimer,
        "/v1/timer/reset" => Command::ResetTimer,
        other => return Err(CommandError::UnknownRoute(other.to_string()).into()),
    };
    Ok(Route::Control(command))
}

fn parse_flag(raw: &str) -> Result<bool, CommandError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        other => Err(CommandError::InvalidArgument(format!(
            "on must be true or false, got '{other}'"
        ))),
    }
}

fn required_param(query: &str, key: &str) -> Result<String, CommandError> {
    query_param(query, key)
        .map(decode_query_value)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| CommandError::InvalidArgument(format!("missing query parameter '{key}'")))
}

fn optional_number(query: &str, key: &str) -> Result<i32, CommandError> {
    match query_param(query, key) {
        None | Some("") => Ok(0),
        Some(raw) => raw.trim().parse::<i32>().map_err(|_| {
            CommandError::InvalidArgument(format!("{key} must be an integer, got '{raw}'"))
        }),
    }
}

fn status_for(err: &CommandError) -> StatusCode {
    match err {
        CommandError::NoTimer
        | CommandError::TimerEnded
        | CommandError::TimerCompleted
        | CommandError::TimerNotStarted => StatusCode(409),
        CommandError::InvalidDuration(_) | CommandError::InvalidArgument(_) => StatusCode(400),
        CommandError::ReloadFailed(_) => StatusCode(422),
        CommandError::Disconnected => StatusCode(503),
        CommandError::Timeout => StatusCode(504),
        CommandError::UnknownRoute(_) => StatusCode(404),
    }
}

fn send_json<T: Serialize>(
    request: tiny_http::Request,
    status: StatusCode,
    body: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(body)?;
    let content_type = Header::from_str("Content-Type: application/json; charset=utf-8")
        .map_err(|_| anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_data(payload)
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

fn send_text(request: tiny_http::Request, status: StatusCode, body: &str) -> Result<()> {
    let content_type = Header::from_str("Content-Type: text/plain; charset=utf-8")
        .map_err(|_| anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_string(body.to_string())
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

fn split_path_query(url: &str) -> (&str, &str) {
    match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    }
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        if k == key {
            return Some(v);
        }
    }
    None
}

/// `+` and `%XX` decoding; malformed escapes are kept literally.
fn decode_query_value(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'+' => out.push(b' '),
            b'%' if index + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[index + 1..index + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        index += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            byte => out.push(byte),
        }
        index += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_local_network_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
                || is_ipv4_mapped_local(v6)
        }
    }
}

fn is_ipv4_mapped_local(v6: Ipv6Addr) -> bool {
    match v6.to_ipv4_mapped() {
        Some(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use super::*;

    #[test]
    fn local_network_ip_filter_accepts_private_and_loopback() {
        assert!(is_local_network_ip(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert!(is_local_network_ip(IpAddr::V4(Ipv4Addr::new(
            192, 168, 1, 44
        ))));
        assert!(is_local_network_ip(IpAddr::V6(Ipv6Addr::new(
            0xfc00, 0, 0, 0, 0, 0, 0, 1
        ))));
        assert!(!is_local_network_ip(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
    }

    #[test]
    fn read_routes_map_to_commands() {
        assert_eq!(route_request(&Method::Get, "/healthz", ""), Ok(Route::Health));
        assert_eq!(
            route_request(&Method::Get, "/v1/state", ""),
            Ok(Route::Control(Command::Status))
        );
        assert_eq!(
            route_request(&Method::Get, "/v1/faces/", ""),
            Ok(Route::Control(Command::ListFaces))
        );
    }

    #[test]
    fn mutations_require_post() {
        assert_eq!(
            route_request(&Method::Get, "/v1/reload", ""),
            Err(RouteError::MethodNotAllowed)
        );
        assert_eq!(
            route_request(&Method::Post, "/v1/state", ""),
            Err(RouteError::MethodNotAllowed)
        );
        assert_eq!(
            route_request(&Method::Post, "/v1/shutdown", ""),
            Ok(Route::Shutdown)
        );
    }

    #[test]
    fn face_route_decodes_the_name() {
        assert_eq!(
            route_request(&Method::Post, "/v1/face", "name=Night%20mode"),
            Ok(Route::Control(Command::SelectFace("Night mode".to_string())))
        );
        assert!(matches!(
            route_request(&Method::Post, "/v1/face", ""),
            Err(RouteError::Rejected(CommandError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn power_route_parses_flags() {
        assert_eq!(
            route_request(&Method::Post, "/v1/power", "on=false"),
            Ok(Route::Control(Command::SetPower(false)))
        );
        assert_eq!(
            route_request(&Method::Post, "/v1/power", "on=1"),
            Ok(Route::Control(Command::SetPower(true)))
        );
        assert!(route_request(&Method::Post, "/v1/power", "on=maybe").is_err());
    }

    #[test]
    fn timer_route_builds_countdown_or_stopwatch() {
        assert_eq!(
            route_request(&Method::Post, "/v1/timer", "minute=5&second=30"),
            Ok(Route::Control(Command::CreateTimer(TimerSpec::Countdown {
                hour: 0,
                minute: 5,
                second: 30
            })))
        );
        assert_eq!(
            route_request(&Method::Post, "/v1/timer", "hour=-2"),
            Ok(Route::Control(Command::CreateTimer(TimerSpec::Stopwatch)))
        );
        assert_eq!(
            route_request(&Method::Post, "/v1/stopwatch", ""),
            Ok(Route::Control(Command::CreateTimer(TimerSpec::Stopwatch)))
        );
        assert!(matches!(
            route_request(&Method::Post, "/v1/timer", "minute=-1"),
            Err(RouteError::Rejected(CommandError::InvalidDuration(_)))
        ));
        assert!(matches!(
            route_request(&Method::Post, "/v1/timer", "minute=ten"),
            Err(RouteError::Rejected(CommandError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn unknown_route_is_rejected() {
        assert_eq!(
            route_request(&Method::Get, "/v2/nothing", ""),
            Err(RouteError::Rejected(CommandError::UnknownRoute(
                "/v2/nothing".to_string()
            )))
        );
        assert_eq!(status_for(&CommandError::UnknownRoute(String::new())), StatusCode(404));
        assert_eq!(status_for(&CommandError::NoTimer), StatusCode(409));
        assert_eq!(status_for(&CommandError::TimerCompleted), StatusCode(409));
        assert_eq!(status_for(&CommandError::Timeout), StatusCode(504));
    }

    #[test]
    fn query_helpers() {
        let query = "name=a+b&flag";
        assert_eq!(query_param(query, "name"), Some("a+b"));
        assert_eq!(query_param(query, "flag"), Some(""));
        assert_eq!(query_param(query, "missing"), None);
        assert_eq!(decode_query_value("a+b%2Cc"), "a b,c");
        assert_eq!(decode_query_value("100%"), "100%");
        assert_eq!(decode_query_value("%zz"), "%zz");
    }
}
