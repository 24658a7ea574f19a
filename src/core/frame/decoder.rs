use super::record::FrameRecord;
use crate::core::error::LoadError;
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Read;
use xz2::read::XzDecoder;

const FIELD_TIME: &str = "id";
const FIELD_PRIMARY: &str = "cl_hi";
const FIELD_SECONDARY: &str = "cl_ha";

/// 帧记录解码器：xz 解压 + XML 解析
///
/// 归档格式：
/// ```xml
/// <add>
///   <doc>
///     <field name="id">12.5</field>
///     <field name="cl_hi">...</field>
///     <field name="cl_ha">...</field>
///   </doc>
/// </add>
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    pub fn new() -> Self {
        Self
    }

    /// 解压并解析，返回文档顺序的记录（未排序）
    pub fn decode(&self, archive: &[u8]) -> Result<Vec<FrameRecord>, LoadError> {
        let xml = self.decompress(archive)?;
        self.parse(&xml)
    }

    pub fn decompress(&self, archive: &[u8]) -> Result<String, LoadError> {
        let mut raw = Vec::new();
        XzDecoder::new(archive)
            .read_to_end(&mut raw)
            .map_err(|e| LoadError::Decode(format!("xz stream: {}", e)))?;
        debug!("decompressed {} -> {} bytes", archive.len(), raw.len());

        String::from_utf8(raw).map_err(|e| LoadError::Decode(format!("payload is not UTF-8: {}", e)))
    }

    pub fn parse(&self, xml: &str) -> Result<Vec<FrameRecord>, LoadError> {
        // 指纹按原文比较，不裁剪空白；只有时间字段在解析数值时裁剪
        let mut reader = Reader::from_str(xml);

        let mut records = Vec::new();
        let mut doc: Option<DocFields> = None;
        let mut field: Option<(String, String)> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"doc" => doc = Some(DocFields::default()),
                    b"field" if doc.is_some() => field = Some((field_name(&e)?, String::new())),
                    _ => {}
                },
                Event::Empty(e) => {
                    if let (b"field", Some(fields)) = (e.name().as_ref(), doc.as_mut()) {
                        fields.set(&field_name(&e)?, String::new());
                    }
                }
                Event::Text(t) => {
                    if let Some((_, value)) = field.as_mut() {
                        value.push_str(&t.unescape()?);
                    }
                }
                Event::CData(c) => {
                    if let Some((_, value)) = field.as_mut() {
                        let text = std::str::from_utf8(&c)
                            .map_err(|e| LoadError::Parse(format!("CDATA is not UTF-8: {}", e)))?;
                        value.push_str(text);
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"field" => {
                        if let (Some((name, value)), Some(fields)) = (field.take(), doc.as_mut()) {
                            fields.set(&name, value);
                        }
                    }
                    b"doc" => {
                        if let Some(fields) = doc.take() {
                            records.push(fields.into_record(records.len())?);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        debug!("parsed {} frame records", records.len());
        Ok(records)
    }
}

fn field_name(e: &BytesStart<'_>) -> Result<String, LoadError> {
    let attr = e
        .try_get_attribute("name")
        .map_err(|err| LoadError::Parse(err.to_string()))?
        .ok_or_else(|| LoadError::Parse("<field> without name attribute".into()))?;
    Ok(attr.unescape_value()?.into_owned())
}

#[derive(Default)]
struct DocFields {
    time: Option<String>,
    primary: Option<String>,
    secondary: Option<String>,
}

impl DocFields {
    fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            FIELD_TIME => &mut self.time,
            FIELD_PRIMARY => &mut self.primary,
            FIELD_SECONDARY => &mut self.secondary,
            _ => return,
        };
        // 重复字段取第一个
        slot.get_or_insert(value);
    }

    fn into_record(self, index: usize) -> Result<FrameRecord, LoadError> {
        let missing = |name: &str| LoadError::Parse(format!("doc #{} missing field `{}`", index, name));

        let raw_time = self.time.ok_or_else(|| missing(FIELD_TIME))?;
        let time: f64 = raw_time
            .trim()
            .parse()
            .map_err(|_| LoadError::Parse(format!("doc #{} has invalid time `{}`", index, raw_time)))?;
        if !time.is_finite() {
            return Err(LoadError::Parse(format!("doc #{} has non-finite time `{}`", index, raw_time)));
        }

        Ok(FrameRecord {
            time,
            fingerprint_primary: self.primary.ok_or_else(|| missing(FIELD_PRIMARY))?,
            fingerprint_secondary: self.secondary.ok_or_else(|| missing(FIELD_SECONDARY))?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use xz2::write::XzEncoder;

    pub(crate) fn compress(xml: &str) -> Vec<u8> {
        let mut encoder = XzEncoder::new(Vec::new(), 6);
        encoder.write_all(xml.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    pub(crate) fn archive_xml(frames: &[(&str, &str, &str)]) -> String {
        let docs: Vec<String> = frames
            .iter()
            .map(|(t, hi, ha)| {
                format!(
                    "<doc><field name=\"id\">{}</field><field name=\"cl_hi\">{}</field><field name=\"cl_ha\">{}</field></doc>",
                    t, hi, ha
                )
            })
            .collect();
        format!("<?xml version=\"1.0\"?>\n<add>\n{}\n</add>", docs.join("\n"))
    }

    #[test]
    fn test_decode_roundtrip_through_xz() {
        let xml = archive_xml(&[("3.0", "A", "z"), ("0.0", "A", "x"), ("0.5", "A", "y")]);
        let records = FrameDecoder::new().decode(&compress(&xml)).unwrap();

        // 解码保持文档顺序，排序由 FrameSequence 负责
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], FrameRecord::new(3.0, "A", "z"));
        assert_eq!(records[2], FrameRecord::new(0.5, "A", "y"));
    }

    #[test]
    fn test_parse_accepts_cdata_and_padded_time() {
        let xml = "<add>\n  <doc>\n    <field name=\"cl_ha\">ha</field>\n    <field name=\"id\"><![CDATA[ 12.25 ]]></field>\n    <field name=\"cl_hi\">hi</field>\n    <field name=\"extra\">ignored</field>\n  </doc>\n</add>";
        let records = FrameDecoder::new().parse(xml).unwrap();
        assert_eq!(records, vec![FrameRecord::new(12.25, "hi", "ha")]);
    }

    #[test]
    fn test_fingerprint_whitespace_is_preserved() {
        let xml = "<add><doc><field name=\"id\">\n 1 \n</field><field name=\"cl_hi\"> A\n</field><field name=\"cl_ha\">b </field></doc></add>";
        let records = FrameDecoder::new().parse(xml).unwrap();
        assert_eq!(records, vec![FrameRecord::new(1.0, " A\n", "b ")]);
    }

    #[test]
    fn test_duplicate_field_keeps_first() {
        let xml = "<add><doc><field name=\"id\">1</field><field name=\"id\">9</field><field name=\"cl_hi\">A</field><field name=\"cl_hi\">Z</field><field name=\"cl_ha\">B</field></doc></add>";
        let records = FrameDecoder::new().parse(xml).unwrap();
        assert_eq!(records, vec![FrameRecord::new(1.0, "A", "B")]);
    }

    #[test]
    fn test_parse_empty_field_element() {
        let xml = "<add><doc><field name=\"id\">1</field><field name=\"cl_hi\">A</field><field name=\"cl_ha\"/></doc></add>";
        let records = FrameDecoder::new().parse(xml).unwrap();
        assert_eq!(records[0].fingerprint_secondary, "");
    }

    #[test]
    fn test_parse_ignores_non_doc_children() {
        let xml = "<add><meta>x</meta><doc><field name=\"id\">1</field><field name=\"cl_hi\">A</field><field name=\"cl_ha\">B</field></doc></add>";
        assert_eq!(FrameDecoder::new().parse(xml).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let xml = "<add><doc><field name=\"id\">1</field><field name=\"cl_hi\">A</field></doc></add>";
        match FrameDecoder::new().parse(xml) {
            Err(LoadError::Parse(msg)) => assert!(msg.contains("cl_ha")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_time_is_parse_error() {
        let xml = archive_xml(&[("abc", "A", "B")]);
        assert!(matches!(FrameDecoder::new().parse(&xml), Err(LoadError::Parse(_))));

        let xml = archive_xml(&[("inf", "A", "B")]);
        assert!(matches!(FrameDecoder::new().parse(&xml), Err(LoadError::Parse(_))));
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let xml = "<add><doc><field name=\"id\">1</wrong></doc></add>";
        assert!(matches!(FrameDecoder::new().parse(xml), Err(LoadError::Parse(_))));
    }

    #[test]
    fn test_corrupt_archive_is_decode_error() {
        let result = FrameDecoder::new().decode(b"definitely not xz");
        assert!(matches!(result, Err(LoadError::Decode(_))));
    }

    #[test]
    fn test_empty_archive_has_no_records() {
        let records = FrameDecoder::new().decode(&compress("<add></add>")).unwrap();
        assert!(records.is_empty());
    }
}
