//! `trustlines://` deep links.
//!
//! ```text
//! trustlines://contact/{address}?name=...
//! trustlines://paymentrequest/{network}/{address}/{amount}?subject=...&id=...
//! ```
//!
//! Segments and query values are percent-encoded the way JavaScript's
//! `encodeURIComponent` does it. Links produced by older clients must keep
//! parsing, so unknown query parameters are preserved and never rejected.

use crate::amount::check_decimal;
use crate::error::{Result, TlError};
use crate::utils::parse_address;
use std::collections::BTreeMap;
use url::Url;

pub const LINK_SCHEME: &str = "trustlines";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLink {
    Contact {
        address: String,
        params: BTreeMap<String, String>,
    },
    PaymentRequest {
        network: String,
        address: String,
        amount: String,
        params: BTreeMap<String, String>,
    },
    Other {
        path: Vec<String>,
        params: BTreeMap<String, String>,
    },
}

/// Build a link from raw path segments and query parameters. Parameters with
/// empty values are left out.
pub fn create_link(path: &[&str], params: &[(&str, &str)]) -> String {
    let segments: Vec<String> = path
        .iter()
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    let query: Vec<String> = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| {
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
        })
        .collect();

    let mut link = format!("{}://{}", LINK_SCHEME, segments.join("/"));
    if !query.is_empty() {
        link.push('?');
        link.push_str(&query.join("&"));
    }
    link
}

pub fn contact_link(address: &str, name: Option<&str>, params: &[(&str, &str)]) -> Result<String> {
    parse_address(address, "contact address")?;
    let mut query = Vec::with_capacity(params.len() + 1);
    if let Some(name) = name {
        query.push(("name", name));
    }
    query.extend_from_slice(params);
    Ok(create_link(&["contact", address], &query))
}

pub fn payment_request_link(
    network: &str,
    receiver: &str,
    amount: &str,
    subject: Option<&str>,
    id: Option<&str>,
) -> Result<String> {
    parse_address(network, "network address")?;
    parse_address(receiver, "receiver address")?;
    check_decimal(amount)?;
    let mut query = Vec::with_capacity(2);
    if let Some(subject) = subject {
        query.push(("subject", subject));
    }
    if let Some(id) = id {
        query.push(("id", id));
    }
    Ok(create_link(
        &["paymentrequest", network, receiver, amount.trim()],
        &query,
    ))
}

pub fn parse_link(link: &str) -> Result<DeepLink> {
    let url = Url::parse(link.trim())
        .map_err(|e| TlError::invalid_argument(format!("link {:?}: {}", link, e)))?;
    if url.scheme() != LINK_SCHEME {
        return Err(TlError::invalid_argument(format!(
            "link {:?} does not use the {}:// scheme",
            link, LINK_SCHEME
        )));
    }

    let mut path = Vec::new();
    if let Some(host) = url.host_str() {
        path.push(decode_component(host)?);
    }
    if let Some(segments) = url.path_segments() {
        for segment in segments.filter(|s| !s.is_empty()) {
            path.push(decode_component(segment)?);
        }
    }
    let params: BTreeMap<String, String> = url.query_pairs().into_owned().collect();

    let link = match path.as_slice() {
        [kind, address] if kind == "contact" => DeepLink::Contact {
            address: address.clone(),
            params,
        },
        [kind, network, address, amount] if kind == "paymentrequest" => DeepLink::PaymentRequest {
            network: network.clone(),
            address: address.clone(),
            amount: amount.clone(),
            params,
        },
        _ => DeepLink::Other { path, params },
    };
    Ok(link)
}

fn decode_component(component: &str) -> Result<String> {
    urlencoding::decode(component)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| TlError::invalid_argument(format!("{:?}: {}", component, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0xf8e191d2cd72ff35cb8f012685a29b31996614ea";
    const NETWORK: &str = "0xc5f4ce02d2e0b4e40fdab9f84ef4da4ff7f0e3e1";

    #[test]
    fn contact_link_with_name() {
        let link = contact_link(ALICE, Some("Alice Smith"), &[]).unwrap();
        assert_eq!(link, format!("trustlines://contact/{}?name=Alice%20Smith", ALICE));
    }

    #[test]
    fn contact_link_without_params() {
        assert_eq!(
            contact_link(ALICE, None, &[]).unwrap(),
            format!("trustlines://contact/{}", ALICE)
        );
        assert!(contact_link("0x123", None, &[]).is_err());
    }

    #[test]
    fn payment_request_link_shape() {
        let link =
            payment_request_link(NETWORK, ALICE, "12.5", Some("Pizza & beer"), Some("0x01")).unwrap();
        assert_eq!(
            link,
            format!(
                "trustlines://paymentrequest/{}/{}/12.5?subject=Pizza%20%26%20beer&id=0x01",
                NETWORK, ALICE
            )
        );
        assert!(payment_request_link(NETWORK, ALICE, "a lot", None, None).is_err());
    }

    #[test]
    fn whole_amounts_make_payment_links() {
        for amount in ["1", "2", "12", "100", "1000000.000001"] {
            let link = payment_request_link(NETWORK, ALICE, amount, None, None).unwrap();
            assert!(link.ends_with(&format!("/{}", amount)), "{}", link);
        }
        assert!(payment_request_link(NETWORK, ALICE, "1.2.3", None, None).is_err());
    }

    #[test]
    fn empty_params_are_dropped() {
        assert_eq!(
            create_link(&["contact", ALICE], &[("name", "")]),
            format!("trustlines://contact/{}", ALICE)
        );
    }

    #[test]
    fn links_parse_back() {
        let link = contact_link(ALICE, Some("Bob & Co"), &[("ref", "x y")]).unwrap();
        match parse_link(&link).unwrap() {
            DeepLink::Contact { address, params } => {
                assert_eq!(address, ALICE);
                assert_eq!(params.get("name").map(String::as_str), Some("Bob & Co"));
                assert_eq!(params.get("ref").map(String::as_str), Some("x y"));
            }
            other => panic!("unexpected link {:?}", other),
        }

        let link = payment_request_link(NETWORK, ALICE, "3", Some("rent"), None).unwrap();
        assert_eq!(
            parse_link(&link).unwrap(),
            DeepLink::PaymentRequest {
                network: NETWORK.to_string(),
                address: ALICE.to_string(),
                amount: "3".to_string(),
                params: BTreeMap::from([("subject".to_string(), "rent".to_string())]),
            }
        );
    }

    #[test]
    fn unknown_links_are_kept() {
        match parse_link("trustlines://something/else?x=1").unwrap() {
            DeepLink::Other { path, params } => {
                assert_eq!(path, vec!["something".to_string(), "else".to_string()]);
                assert_eq!(params.get("x").map(String::as_str), Some("1"));
            }
            other => panic!("unexpected link {:?}", other),
        }
        assert!(parse_link("https://example.org/contact/0x1").is_err());
        assert!(parse_link("not a link").is_err());
    }
}
