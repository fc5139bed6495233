/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! `hosts` plugin
//!
//! Answers A/AAAA queries directly from a preloaded table of name patterns.
//! Each table line is `<pattern> <addr1> [addr2 ...]` where the pattern is a
//! literal domain (case-insensitive, exact match only) or a
//! `regexp:`-prefixed expression matched verbatim, no implicit anchoring.
//! Repeated lines for the same pattern append their addresses. A matched
//! entry answers with the addresses of the requested family; an entry with
//! none of that family still counts as a hit and yields an empty answer
//! section.

use crate::core::context::{ContextStatus, DnsContext};
use crate::core::dns_utils::{build_response_from_request, normalize_name};
use crate::core::error::{DnsError, Result};
use crate::core::exec_ctx::ExecCtx;
use crate::plugin::{Matcher, Plugin};
use ahash::AHashMap;
use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{DNSClass, RData, Record, RecordType};
use regex::Regex;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::IpAddr;

const HOSTS_TTL: u32 = 3600;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HostsArgs {
    /// Inline table lines
    #[serde(default)]
    pub entries: Vec<String>,

    /// Paths to line-oriented table files
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Default, Clone)]
struct AddrSet {
    v4: Vec<std::net::Ipv4Addr>,
    v6: Vec<std::net::Ipv6Addr>,
}

impl AddrSet {
    fn extend(&mut self, other: AddrSet) {
        self.v4.extend(other.v4);
        self.v6.extend(other.v6);
    }
}

#[derive(Debug)]
struct RegexpRule {
    expr: String,
    pattern: Regex,
    addrs: AddrSet,
}

/// Mixed literal/regexp table over one namespace. Built once at load time,
/// read-only at query time. Exact literal matches take precedence over
/// regexp rules; regexp rules apply in table order.
#[derive(Debug, Default)]
struct MixedMatcher {
    literals: AHashMap<String, AddrSet>,
    regexps: Vec<RegexpRule>,
}

impl MixedMatcher {
    fn add(&mut self, pattern: &str, addrs: AddrSet) -> std::result::Result<(), String> {
        if let Some(expr) = pattern.strip_prefix("regexp:") {
            if let Some(rule) = self.regexps.iter_mut().find(|r| r.expr == expr) {
                rule.addrs.extend(addrs);
                return Ok(());
            }
            let compiled =
                Regex::new(expr).map_err(|e| format!("invalid regexp '{expr}': {e}"))?;
            self.regexps.push(RegexpRule {
                expr: expr.to_string(),
                pattern: compiled,
                addrs,
            });
            return Ok(());
        }

        self.literals
            .entry(normalize_name(pattern))
            .or_default()
            .extend(addrs);
        Ok(())
    }

    fn find(&self, name: &str) -> Option<&AddrSet> {
        if let Some(addrs) = self.literals.get(name) {
            return Some(addrs);
        }
        self.regexps
            .iter()
            .find(|rule| rule.pattern.is_match(name))
            .map(|rule| &rule.addrs)
    }
}

/// Static hosts/domain matcher plugin
#[derive(Debug)]
pub struct HostsPlugin {
    tag: String,
    matcher: MixedMatcher,
}

impl HostsPlugin {
    pub fn new(tag: impl Into<String>, args: HostsArgs) -> Result<Self> {
        let mut matcher = MixedMatcher::default();

        for (idx, line) in args.entries.iter().enumerate() {
            load_line(&mut matcher, line).map_err(|e| {
                DnsError::plugin(format!("invalid hosts entry #{idx} '{line}': {e}"))
            })?;
        }

        for path in &args.files {
            let file = File::open(path)
                .map_err(|e| DnsError::plugin(format!("failed to open hosts file '{path}': {e}")))?;
            load_from_reader(&mut matcher, BufReader::new(file), path)?;
        }

        Ok(Self {
            tag: tag.into(),
            matcher,
        })
    }

    /// Look the question up in the table; on a hit, synthesize the answer
    /// and mark the context responded.
    fn match_and_set(&self, qctx: &mut DnsContext) -> bool {
        let Some(query) = qctx.request.queries().first() else {
            return false;
        };
        if query.query_class() != DNSClass::IN {
            return false;
        }
        let qtype = query.query_type();
        if qtype != RecordType::A && qtype != RecordType::AAAA {
            return false;
        }

        let name = normalize_name(&query.name().to_ascii());
        let Some(addrs) = self.matcher.find(&name) else {
            return false;
        };

        let qname = query.name().clone();
        let mut response = build_response_from_request(&qctx.request, ResponseCode::NoError);
        match qtype {
            RecordType::A => {
                for ip in &addrs.v4 {
                    response.add_answer(Record::from_rdata(
                        qname.clone(),
                        HOSTS_TTL,
                        RData::A(A(*ip)),
                    ));
                }
            }
            _ => {
                for ip in &addrs.v6 {
                    response.add_answer(Record::from_rdata(
                        qname.clone(),
                        HOSTS_TTL,
                        RData::AAAA(AAAA(*ip)),
                    ));
                }
            }
        }

        qctx.set_response(response, ContextStatus::Responded);
        true
    }
}

fn load_line(matcher: &mut MixedMatcher, raw: &str) -> std::result::Result<(), String> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    if fields.len() < 2 {
        return Err("hosts line must carry a pattern and at least one address".to_string());
    }

    let mut addrs = AddrSet::default();
    for token in &fields[1..] {
        match token.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => addrs.v4.push(v4),
            Ok(IpAddr::V6(v6)) => addrs.v6.push(v6),
            Err(e) => return Err(format!("invalid address '{token}': {e}")),
        }
    }

    matcher.add(fields[0], addrs)
}

fn load_from_reader<R: BufRead>(
    matcher: &mut MixedMatcher,
    reader: R,
    source: &str,
) -> Result<()> {
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            DnsError::plugin(format!(
                "failed to read hosts source '{}' at line {}: {}",
                source,
                line_no + 1,
                e
            ))
        })?;

        let raw = line.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }
        let raw = raw.split_once('#').map(|(left, _)| left).unwrap_or(raw).trim();
        if raw.is_empty() {
            continue;
        }

        load_line(matcher, raw).map_err(|e| {
            DnsError::plugin(format!(
                "invalid hosts source '{}' line {} '{}': {}",
                source,
                line_no + 1,
                raw,
                e
            ))
        })?;
    }
    Ok(())
}

impl Plugin for HostsPlugin {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn type_name(&self) -> &str {
        "hosts"
    }
}

#[async_trait]
impl Matcher for HostsPlugin {
    /// Lookups cannot fail once the table is loaded; an unmatched name
    /// leaves the context untouched.
    async fn is_match(&self, _ctx: &ExecCtx, qctx: &mut DnsContext) -> Result<bool> {
        Ok(self.match_and_set(qctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Message, Query};
    use hickory_proto::rr::Name;

    const TEST_HOSTS: &str = "
# comment
     # empty line
dns.google 8.8.8.8 8.8.4.4 2001:4860:4860::8844 2001:4860:4860::8888
regexp:^123456789 192.168.1.1
test.com 1.2.3.4
test.com 2.3.4.5
# nxdomain.com 1.2.3.4
";

    fn make_plugin() -> HostsPlugin {
        let args = HostsArgs {
            entries: TEST_HOSTS
                .lines()
                .map(str::to_string)
                .filter(|l| {
                    let t = l.trim();
                    !t.is_empty() && !t.starts_with('#')
                })
                .collect(),
            files: vec![],
        };
        HostsPlugin::new("test", args).unwrap()
    }

    fn make_qctx(name: &str, qtype: RecordType) -> DnsContext {
        let mut request = Message::new();
        let mut query = Query::query(Name::from_ascii(name).unwrap(), qtype);
        query.set_query_class(DNSClass::IN);
        request.add_query(query);
        DnsContext::new(request)
    }

    fn answer_ips(qctx: &DnsContext) -> Vec<IpAddr> {
        qctx.response()
            .map(|r| {
                r.answers()
                    .iter()
                    .filter_map(|record| match record.data() {
                        RData::A(v) => Some(IpAddr::V4(v.0)),
                        RData::AAAA(v) => Some(IpAddr::V6(v.0)),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn run_case(name: &str, qtype: RecordType, want_matched: bool, want_addrs: &[&str]) {
        let plugin = make_plugin();
        let mut qctx = make_qctx(name, qtype);
        let matched = plugin.match_and_set(&mut qctx);
        assert_eq!(matched, want_matched, "match for {name}");

        let got = answer_ips(&qctx);
        assert_eq!(got.len(), want_addrs.len(), "answer count for {name}");
        for want in want_addrs {
            let want: IpAddr = want.parse().unwrap();
            assert!(got.contains(&want), "{want} missing from answer for {name}");
        }

        if want_matched {
            assert_eq!(qctx.status(), ContextStatus::Responded);
            assert_eq!(qctx.response().unwrap().id(), qctx.request.id());
        } else {
            assert_eq!(qctx.status(), ContextStatus::Unset);
            assert!(qctx.response().is_none());
        }
    }

    #[test]
    fn test_matched_a() {
        run_case("dns.google.", RecordType::A, true, &["8.8.8.8", "8.8.4.4"]);
    }

    #[test]
    fn test_matched_aaaa() {
        run_case(
            "dns.google.",
            RecordType::AAAA,
            true,
            &["2001:4860:4860::8844", "2001:4860:4860::8888"],
        );
    }

    #[test]
    fn test_not_matched() {
        run_case("nxdomain.com.", RecordType::A, false, &[]);
    }

    #[test]
    fn test_literal_does_not_match_subdomain() {
        run_case("sub.dns.google.", RecordType::A, false, &[]);
    }

    #[test]
    fn test_regexp_matches_per_expression() {
        run_case("123456789.test.", RecordType::A, true, &["192.168.1.1"]);
    }

    #[test]
    fn test_regexp_anchor_respected() {
        run_case("0123456789.test.", RecordType::A, false, &[]);
    }

    #[test]
    fn test_repeated_pattern_appends_addresses() {
        run_case("test.com.", RecordType::A, true, &["1.2.3.4", "2.3.4.5"]);
    }

    #[test]
    fn test_literal_match_is_case_insensitive() {
        run_case("DNS.Google.", RecordType::A, true, &["8.8.8.8", "8.8.4.4"]);
    }

    #[test]
    fn test_empty_family_is_still_a_hit() {
        // regexp entry has no v6 address; an AAAA hit answers with nothing
        run_case("123456789.test.", RecordType::AAAA, true, &[]);
    }

    #[test]
    fn test_comments_and_blanks_are_skipped() {
        let mut matcher = MixedMatcher::default();
        load_from_reader(&mut matcher, TEST_HOSTS.as_bytes(), "inline").unwrap();
        assert!(matcher.find("nxdomain.com").is_none());
        assert!(matcher.find("dns.google").is_some());
    }

    #[test]
    fn test_invalid_address_fails_load() {
        let err = HostsPlugin::new(
            "test",
            HostsArgs {
                entries: vec!["bad.example not-an-ip".to_string()],
                files: vec![],
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("bad.example"));
    }

    #[test]
    fn test_invalid_regexp_fails_load() {
        assert!(HostsPlugin::new(
            "test",
            HostsArgs {
                entries: vec!["regexp:([ 1.2.3.4".to_string()],
                files: vec![],
            },
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_matcher_role_dispatch() {
        let plugin = make_plugin();
        let ctx = ExecCtx::background();
        let mut qctx = make_qctx("dns.google.", RecordType::A);
        assert!(plugin.is_match(&ctx, &mut qctx).await.unwrap());
    }
}
