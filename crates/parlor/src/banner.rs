//! Startup banner: access URLs and a terminal QR code for phones on the LAN.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use anyhow::Result;
use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;

/// Environment variable that marks a hosted deployment.
pub const ENV_VAR: &str = "PARLOR_ENV";

/// URLs printed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUrls {
    /// URL for this machine, or the configured public URL.
    pub local: String,
    /// URL for other devices on the same network.
    pub network: Option<String>,
}

/// Work out the access URLs for a bound address.
///
/// A wildcard bind is reachable on the LAN address; a loopback bind is not
/// reachable from other devices at all.
pub fn access_urls(bound: SocketAddr, public_url: Option<&str>, lan: Option<Ipv4Addr>) -> AccessUrls {
    let port = bound.port();
    let local = public_url.map_or_else(|| format!("http://localhost:{port}"), str::to_owned);
    let network = match bound.ip() {
        ip if ip.is_unspecified() => lan.map(|ip| format!("http://{ip}:{port}")),
        ip if ip.is_loopback() => None,
        IpAddr::V4(ip) => Some(format!("http://{ip}:{port}")),
        IpAddr::V6(ip) => Some(format!("http://[{ip}]:{port}")),
    };
    AccessUrls { local, network }
}

/// Whether to draw the QR code.
pub fn show_qr(no_qr: bool, env: Option<&str>) -> bool {
    !no_qr && env.is_none_or(|env| !env.trim().eq_ignore_ascii_case("production"))
}

/// Primary non-loopback IPv4 address of this machine.
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick the
/// outbound interface.
pub fn lan_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// Render `url` as a QR code made of half-block characters.
pub fn render_qr(url: &str) -> Result<String> {
    let code = QrCode::new(url.as_bytes())?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Multi-line banner text.
pub fn render(urls: &AccessUrls, qr: bool) -> Result<String> {
    let mut out = format!("\nAccess URLs:\nLocal: {}\n", urls.local);
    if let Some(ref network) = urls.network {
        out.push_str(&format!("Network: {network}\n"));
        if qr {
            out.push_str("\nQR code for the network URL:\n");
            out.push_str(&render_qr(network)?);
            out.push('\n');
        }
    }
    Ok(out)
}
