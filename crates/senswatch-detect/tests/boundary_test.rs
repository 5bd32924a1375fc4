//! Chunked scanning must report exactly what a whole-text scan reports,
//! wherever the byte stream is split and however small the window.

use proptest::prelude::*;
use senswatch_detect::matcher::{match_reader, scan_text};
use senswatch_detect::{RuleSet, StreamMatcher};

const SNIPPETS: &[&str] = &[
    "13812345678",
    "110101199003074514",
    "4111111111111111",
    "a.b@example.com",
    "192.168.1.1",
    "00:1A:2B:3C:4D:5E",
    "2001:db8::1",
    "汉族",
    "男",
    "Female",
    "京A12345",
    "粤B2345学",
    "jdbc:mysql://db.local:3306/app?useSSL=false",
    "91350100M000100Y43",
    "110108000000019",
    "123456788",
    "0755-12345678",
    "H12345678",
    "E12345678",
    "沪字第12345号",
    "中文文本",
    "1234567890",
    "abc",
    " ",
    "\n",
    ",",
    "-",
    ":",
    "@",
];

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(SNIPPETS), 150..500)
        .prop_map(|parts| parts.concat())
}

fn stream(text: &str, chunk_sizes: &[usize], window_bytes: usize) -> StreamMatcher<'static> {
    let mut matcher = StreamMatcher::new(RuleSet::builtin(), window_bytes);
    let bytes = text.as_bytes();
    let mut offset = 0;
    let mut sizes = chunk_sizes.iter().cycle();
    while offset < bytes.len() {
        let size = sizes.next().copied().unwrap_or(1);
        let end = (offset + size).min(bytes.len());
        matcher.feed(&bytes[offset..end]);
        offset = end;
    }
    matcher.finish();
    matcher
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn split_stream_matches_whole_text(
        text in text_strategy(),
        chunk_sizes in prop::collection::vec(1usize..3000, 1..8),
        window_bytes in 32usize..2048,
    ) {
        let whole = scan_text(RuleSet::builtin(), &text);
        let streamed = stream(&text, &chunk_sizes, window_bytes).into_table();
        prop_assert_eq!(streamed, whole);
    }

    #[test]
    fn settled_segments_cover_text_once(
        text in text_strategy(),
        chunk_size in 1usize..2000,
        window_bytes in 32usize..1024,
    ) {
        let mut matcher = StreamMatcher::new(RuleSet::builtin(), window_bytes).with_settled_text();
        let mut settled = String::new();
        for chunk in text.as_bytes().chunks(chunk_size) {
            matcher.feed(chunk);
            settled.extend(matcher.take_settled_text());
        }
        matcher.finish();
        settled.extend(matcher.take_settled_text());
        prop_assert_eq!(settled, text);
    }
}

#[tokio::test]
async fn test_match_reader_on_large_document() {
    let line = "客户 13812345678 证件 110101199003074514 卡号 4111111111111111\n";
    let text = line.repeat(2_000);
    let mut reader = text.as_bytes();

    let table = match_reader(RuleSet::builtin(), &mut reader, 4096, 8192)
        .await
        .expect("read from slice");

    assert_eq!(table.get("phone").len(), 2_000);
    assert_eq!(table.get("id_number").len(), 2_000);
    assert_eq!(table.get("bank_card").len(), 2_000);
    assert_eq!(table, scan_text(RuleSet::builtin(), &text));
}

#[test]
fn test_multibyte_split_at_every_offset() {
    let text = format!("{}身份证110101199003074514男", "填充文字".repeat(400));
    let whole = scan_text(RuleSet::builtin(), &text);
    assert_eq!(whole.get("id_number"), ["110101199003074514"]);

    for first in [1, 2, 4797, 4798, 4799, 4800] {
        let first = first.min(text.len());
        let mut matcher = StreamMatcher::new(RuleSet::builtin(), 64);
        matcher.feed(&text.as_bytes()[..first]);
        matcher.feed(&text.as_bytes()[first..]);
        matcher.finish();
        assert_eq!(matcher.into_table(), whole, "split at byte {first}");
    }
}
