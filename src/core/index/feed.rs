use std::collections::HashMap;
use std::fmt::Write;

use quick_xml::escape::escape;
use serde::Serialize;

use crate::core::frame::FrameRecord;

/// 待写入索引的文档
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDocument {
    pub id: String,
    pub fingerprint_primary: String,
    pub fingerprint_secondary: String,
}

/// 一次发布的 `<add>` 更新包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFeed {
    documents: Vec<IndexDocument>,
    collisions: usize,
}

impl UpdateFeed {
    pub fn documents(&self) -> &[IndexDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// 因两位小数取整而重名、被追加后缀的文档数
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn to_xml(&self) -> String {
        let mut body = String::with_capacity(self.documents.len() * 160);
        for (i, doc) in self.documents.iter().enumerate() {
            if i > 0 {
                body.push('\n');
            }
            let _ = write!(
                body,
                "<doc><field name=\"id\">{}</field><field name=\"cl_hi\">{}</field><field name=\"cl_ha\">{}</field></doc>",
                cdata(&doc.id),
                escape(doc.fingerprint_primary.as_str()),
                escape(doc.fingerprint_secondary.as_str()),
            );
        }
        format!("<add>\n{}\n</add>", body)
    }
}

/// 提交指令
pub const COMMIT_BODY: &str = "<commit/>";

pub struct FeedBuilder;

impl FeedBuilder {
    /// 文档 id 为 `<source_id>/<time 保留两位小数>`，重名时追加 `~n`
    pub fn build(source_id: &str, deduped: &[FrameRecord]) -> UpdateFeed {
        let mut seen: HashMap<String, usize> = HashMap::with_capacity(deduped.len());
        let mut collisions = 0;

        let documents = deduped
            .iter()
            .map(|record| {
                let base = document_id(source_id, record.time);
                let repeat = seen.entry(base.clone()).or_insert(0);
                let id = if *repeat == 0 {
                    base
                } else {
                    collisions += 1;
                    format!("{}~{}", base, repeat)
                };
                *repeat += 1;

                IndexDocument {
                    id,
                    fingerprint_primary: record.fingerprint_primary.clone(),
                    fingerprint_secondary: record.fingerprint_secondary.clone(),
                }
            })
            .collect();

        UpdateFeed {
            documents,
            collisions,
        }
    }
}

pub fn document_id(source_id: &str, time: f64) -> String {
    format!("{}/{}", source_id, fixed_2(time))
}

/// 保留两位小数，恰好落在中点时远离零取整（0.125 -> 0.13）
///
/// `{:.2}` 对精确中点取偶数，与已有索引中的 id 不一致。
/// 两位小数的精确中点只可能是 1/8 的奇数倍。
fn fixed_2(time: f64) -> String {
    let magnitude = time.abs();
    let eighths = magnitude * 8.0;
    if eighths.fract() == 0.0 && eighths % 2.0 == 1.0 && magnitude < 1e15 {
        let cents = (magnitude * 100.0).round() as u64;
        let sign = if time < 0.0 { "-" } else { "" };
        return format!("{}{}.{:02}", sign, cents / 100, cents % 100);
    }
    format!("{:.2}", time)
}

fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_two_documents() {
        let deduped = vec![FrameRecord::new(0.0, "A", "x"), FrameRecord::new(3.0, "A", "z")];
        let feed = FeedBuilder::build("show/ep01", &deduped);

        let ids: Vec<&str> = feed.documents().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["show/ep01/0.00", "show/ep01/3.00"]);
        assert_eq!(feed.collisions(), 0);
    }

    #[test]
    fn test_xml_layout() {
        let feed = FeedBuilder::build("rec", &[FrameRecord::new(1.5, "hi", "ha")]);
        assert_eq!(
            feed.to_xml(),
            "<add>\n<doc><field name=\"id\"><![CDATA[rec/1.50]]></field><field name=\"cl_hi\">hi</field><field name=\"cl_ha\">ha</field></doc>\n</add>"
        );
    }

    #[test]
    fn test_multiple_documents_are_newline_separated() {
        let feed = FeedBuilder::build(
            "rec",
            &[FrameRecord::new(0.0, "a", "b"), FrameRecord::new(1.0, "c", "d")],
        );
        let xml = feed.to_xml();
        assert_eq!(xml.matches("<doc>").count(), 2);
        assert!(xml.contains("</doc>\n<doc>"));
    }

    #[test]
    fn test_empty_feed() {
        let feed = FeedBuilder::build("rec", &[]);
        assert!(feed.is_empty());
        assert_eq!(feed.to_xml(), "<add>\n\n</add>");
    }

    #[test]
    fn test_fields_are_escaped() {
        let feed = FeedBuilder::build("a]]>b", &[FrameRecord::new(0.0, "<x&y>", "\"q\"")]);
        let xml = feed.to_xml();
        assert!(xml.contains("<![CDATA[a]]]]><![CDATA[>b/0.00]]>"));
        assert!(xml.contains("&lt;x&amp;y&gt;"));
        assert!(!xml.contains("<x&y>"));
    }

    #[test]
    fn test_rounding_collision_gets_suffix() {
        let deduped = vec![
            FrameRecord::new(1.001, "A", ""),
            FrameRecord::new(1.004, "B", ""),
            FrameRecord::new(1.003, "C", ""),
        ];
        let feed = FeedBuilder::build("rec", &deduped);

        let ids: Vec<&str> = feed.documents().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["rec/1.00", "rec/1.00~1", "rec/1.00~2"]);
        assert_eq!(feed.collisions(), 2);
    }

    #[test]
    fn test_two_decimal_formatting() {
        assert_eq!(document_id("s", 12.3456), "s/12.35");
        assert_eq!(document_id("s", 7.0), "s/7.00");
    }

    #[test]
    fn test_exact_midpoints_round_up() {
        assert_eq!(document_id("s", 0.125), "s/0.13");
        assert_eq!(document_id("s", 0.375), "s/0.38");
        assert_eq!(document_id("s", 0.625), "s/0.63");
        assert_eq!(document_id("s", 0.875), "s/0.88");
        assert_eq!(document_id("s", 12.625), "s/12.63");
        assert_eq!(document_id("s", -0.125), "s/-0.13");
        // 非中点不受影响
        assert_eq!(document_id("s", 0.5), "s/0.50");
        assert_eq!(document_id("s", 0.25), "s/0.25");
        assert_eq!(document_id("s", 1.005), "s/1.00");
    }
}
