//! HTTPS 监听器的证书：读取给定的 PEM，或在内存中生成自签名证书。

use axum_server::tls_rustls::RustlsConfig;
use rcgen::generate_simple_self_signed;
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::config::Args;

/// 构建 Rustls 配置；只给出证书或私钥之一视为配置错误。
pub async fn build_rustls_config(args: &Args, host: IpAddr) -> io::Result<RustlsConfig> {
    let (cert, key) = match provided_pem_paths(args.tls_cert.as_deref(), args.tls_key.as_deref())? {
        Some((cert_path, key_path)) => {
            info!(cert = ?cert_path, key = ?key_path, "loading TLS certificate");
            (fs::read(&cert_path).await?, fs::read(&key_path).await?)
        }
        None => {
            warn!("no TLS certificate configured, using a self-signed one");
            self_signed_pem(host)?
        }
    };
    RustlsConfig::from_pem(cert, key).await
}

fn provided_pem_paths(
    cert: Option<&str>,
    key: Option<&str>,
) -> io::Result<Option<(PathBuf, PathBuf)>> {
    match (cert, key) {
        (Some(cert), Some(key)) => Ok(Some((PathBuf::from(cert), PathBuf::from(key)))),
        (None, None) => Ok(None),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "--tls-cert and --tls-key must be given together",
        )),
    }
}

fn subject_names(host: IpAddr) -> Vec<String> {
    let mut names = vec!["localhost".to_string()];
    if !host.is_unspecified() && !host.is_loopback() {
        names.push(host.to_string());
    }
    names
}

/// 私钥只保存在内存中，不落盘。
fn self_signed_pem(host: IpAddr) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let names = subject_names(host);
    let certified = generate_simple_self_signed(names.clone()).map_err(io::Error::other)?;
    info!(?names, "generated self-signed certificate");
    Ok((
        certified.cert.pem().into_bytes(),
        certified.key_pair.serialize_pem().into_bytes(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_configured_pair_is_an_error() {
        let err = provided_pem_paths(Some("/etc/panel/cert.pem"), None).expect_err("key missing");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(provided_pem_paths(None, Some("/etc/panel/key.pem")).is_err());
        assert!(provided_pem_paths(None, None).expect("no tls files").is_none());
        let (cert, key) = provided_pem_paths(Some("c.pem"), Some("k.pem"))
            .expect("pair")
            .expect("paths");
        assert_eq!(cert, PathBuf::from("c.pem"));
        assert_eq!(key, PathBuf::from("k.pem"));
    }

    #[test]
    fn wildcard_bind_is_not_a_subject_name() {
        assert_eq!(subject_names("0.0.0.0".parse().expect("ip")), vec!["localhost"]);
        assert_eq!(subject_names("127.0.0.1".parse().expect("ip")), vec!["localhost"]);
        assert_eq!(
            subject_names("192.168.1.10".parse().expect("ip")),
            vec!["localhost", "192.168.1.10"]
        );
    }

    #[test]
    fn self_signed_pair_is_pem_encoded() {
        let (cert, key) = self_signed_pem("192.168.1.10".parse().expect("ip")).expect("generate");
        let cert = String::from_utf8(cert).expect("utf-8 cert");
        let key = String::from_utf8(key).expect("utf-8 key");
        assert!(cert.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(key.contains("PRIVATE KEY-----"));
    }
}
