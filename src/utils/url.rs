use url::Url;

/// Append a query parameter to a stored URL string, keeping the existing
/// query intact. Used to attach verifiers to the redirect-back URLs the
/// admin RPC responses carry.
pub fn append_query_param(url: &str, key: &str, value: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(url)?;
    url.query_pairs_mut().append_pair(key, value);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_to_an_existing_query() {
        let url = append_query_param(
            "http://broker.local/authorize?client_id=test&state=xyz",
            "login_verifier",
            "v1",
        )
        .unwrap();
        assert_eq!(
            url,
            "http://broker.local/authorize?client_id=test&state=xyz&login_verifier=v1"
        );
    }

    #[test]
    fn appends_to_a_bare_url() {
        let url = append_query_param("http://broker.local/authorize", "consent_verifier", "v2")
            .unwrap();
        assert_eq!(url, "http://broker.local/authorize?consent_verifier=v2");
    }

    #[test]
    fn encodes_the_value() {
        let url = append_query_param("http://broker.local/authorize", "k", "a b&c").unwrap();
        assert_eq!(url, "http://broker.local/authorize?k=a+b%26c");
    }

    #[test]
    fn rejects_an_unparseable_url() {
        assert!(append_query_param("not a url", "k", "v").is_err());
    }
}
