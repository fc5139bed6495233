/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

//! Shared DNS-level helpers used across plugins and the cache.

use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::{Record, RecordType};

/// Build a minimal DNS response from a request, preserving id/opcode/query.
pub fn build_response_from_request(request: &Message, rcode: ResponseCode) -> Message {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_op_code(request.op_code());
    response.set_message_type(MessageType::Response);
    response.set_response_code(rcode);
    *response.queries_mut() = request.queries().to_vec();
    response
}

/// Iterate all records in answer/authority/additional sections.
pub fn response_records(message: &Message) -> impl Iterator<Item = &Record> {
    message
        .answers()
        .iter()
        .chain(message.name_servers().iter())
        .chain(message.additionals().iter())
}

/// Rewrite the advertised TTL of every record in the message.
///
/// OPT pseudo-records are left alone; their TTL field encodes EDNS flags,
/// not a lifetime.
pub fn set_msg_ttl(message: &mut Message, ttl: u32) {
    for record in message
        .answers_mut()
        .iter_mut()
        .filter(|r| r.record_type() != RecordType::OPT)
    {
        record.set_ttl(ttl);
    }
    for record in message
        .name_servers_mut()
        .iter_mut()
        .filter(|r| r.record_type() != RecordType::OPT)
    {
        record.set_ttl(ttl);
    }
    for record in message
        .additionals_mut()
        .iter_mut()
        .filter(|r| r.record_type() != RecordType::OPT)
    {
        record.set_ttl(ttl);
    }
}

/// Smallest per-record TTL across the message, OPT excluded. Returns 0 for a
/// message without records.
pub fn minimal_ttl(message: &Message) -> u32 {
    response_records(message)
        .filter(|r| r.record_type() != RecordType::OPT)
        .map(|r| r.ttl())
        .min()
        .unwrap_or(0)
}

/// Deterministic cache key for the question tuple of a message.
///
/// The key depends only on (name, type, class) with the name lowercased, so
/// repeated identical questions share a cache line no matter what message ID
/// or EDNS decoration they carry. Returns `None` for a message without a
/// question.
pub fn msg_cache_key(message: &Message) -> Option<String> {
    let query = message.queries().first()?;
    Some(format!(
        "{} {} {}",
        query.name().to_ascii().to_ascii_lowercase(),
        u16::from(query.query_type()),
        u16::from(query.query_class())
    ))
}

/// Normalize a domain name for table lookups: lowercase, no trailing dot.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::Query;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::{DNSClass, Name, RData, RecordType};

    fn make_request(name: &str, qtype: RecordType) -> Message {
        let mut request = Message::new();
        let mut query = Query::query(Name::from_ascii(name).unwrap(), qtype);
        query.set_query_class(DNSClass::IN);
        request.add_query(query);
        request
    }

    #[test]
    fn test_msg_cache_key_ignores_message_id() {
        let mut a = make_request("DNS.Google.", RecordType::A);
        let mut b = make_request("dns.google.", RecordType::A);
        a.set_id(1);
        b.set_id(9999);
        assert_eq!(msg_cache_key(&a), msg_cache_key(&b));
    }

    #[test]
    fn test_msg_cache_key_differs_per_question() {
        let a = make_request("dns.google.", RecordType::A);
        let aaaa = make_request("dns.google.", RecordType::AAAA);
        assert_ne!(msg_cache_key(&a), msg_cache_key(&aaaa));
    }

    #[test]
    fn test_msg_cache_key_requires_question() {
        assert_eq!(msg_cache_key(&Message::new()), None);
    }

    #[test]
    fn test_minimal_ttl_picks_smallest_record() {
        let request = make_request("dns.google.", RecordType::A);
        let mut response = build_response_from_request(&request, ResponseCode::NoError);
        let name = Name::from_ascii("dns.google.").unwrap();
        response.add_answer(Record::from_rdata(
            name.clone(),
            300,
            RData::A(A("8.8.8.8".parse().unwrap())),
        ));
        response.add_answer(Record::from_rdata(
            name,
            60,
            RData::A(A("8.8.4.4".parse().unwrap())),
        ));
        assert_eq!(minimal_ttl(&response), 60);
    }

    #[test]
    fn test_minimal_ttl_empty_message_is_zero() {
        assert_eq!(minimal_ttl(&Message::new()), 0);
    }

    #[test]
    fn test_set_msg_ttl_rewrites_answers() {
        let request = make_request("dns.google.", RecordType::A);
        let mut response = build_response_from_request(&request, ResponseCode::NoError);
        response.add_answer(Record::from_rdata(
            Name::from_ascii("dns.google.").unwrap(),
            300,
            RData::A(A("8.8.8.8".parse().unwrap())),
        ));
        set_msg_ttl(&mut response, 17);
        assert!(response.answers().iter().all(|r| r.ttl() == 17));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("DNS.Google."), "dns.google");
        assert_eq!(normalize_name("  test.com  "), "test.com");
    }
}
