//! Links that hand a pairing URI to a wallet app

use crate::types::{ConnectionType, Wallet};
use tracing::debug;
use url::form_urlencoded;
use url::Url;

/// Build the link that opens `wallet` for a relay pairing.
///
/// With a pairing URI and the app installed, the wallet's universal link is
/// preferred, then its native link, then the raw pairing URI. When the app is
/// not installed the store link is used if the catalog knows one. Without a
/// pairing URI only the wallet's native scheme is opened, to bring the app to
/// the foreground.
pub fn wallet_link(
    wallet: &Wallet,
    pairing_uri: Option<&str>,
    connection_type: &ConnectionType,
    installed: bool,
) -> Option<Url> {
    match pairing_uri {
        Some(uri) if installed => installed_link(wallet, uri, connection_type),
        Some(uri) => wallet
            .app_link()
            .and_then(|link| Url::parse(link).ok())
            .or_else(|| Url::parse(uri).ok()),
        None if installed => wallet
            .native_link()
            .and_then(|native| Url::parse(&format!("{}///", native)).ok()),
        None => None,
    }
}

fn installed_link(wallet: &Wallet, uri: &str, connection_type: &ConnectionType) -> Option<Url> {
    let config = wallet.config.as_ref();
    let connections = config.and_then(|c| c.connections(connection_type));
    let encoded = encode_pairing_uri(uri, config.and_then(|c| c.encoding.as_deref()));

    let universal = connections
        .and_then(|c| c.universal.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let native = connections
        .and_then(|c| c.native.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(link) = universal.and_then(|u| Url::parse(&format!("{}/wc?uri={}", u, encoded)).ok()) {
        debug!("Using universal link for {}", wallet.name);
        return Some(link);
    }
    if let Some(link) = native.and_then(|n| Url::parse(&format!("{}//wc?uri={}", n, encoded)).ok()) {
        debug!("Using native link for {}", wallet.name);
        return Some(link);
    }
    Url::parse(uri).ok()
}

/// Percent-encode a pairing URI for wallets whose config declares an encoding.
///
/// Spaces become `%20` and `/` is kept literal. Without an encoding the URI is
/// embedded unchanged.
pub fn encode_pairing_uri(uri: &str, encoding: Option<&str>) -> String {
    match encoding {
        Some(_) => form_urlencoded::byte_serialize(uri.as_bytes())
            .collect::<String>()
            .replace('+', "%20")
            .replace("%2F", "/"),
        None => uri.to_string(),
    }
}
