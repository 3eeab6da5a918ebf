use std::fmt;

use crate::error::{PoolError, Result};

/// Pool backends basin can provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Dir,
    Logical,
}

impl PoolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Dir => "dir",
            PoolKind::Logical => "logical",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Pool types libvirt knows about but basin does not provision yet. They are
// rejected with a distinct error so a typo does not read like a roadmap item.
const UNSUPPORTED_KINDS: &[&str] = &[
    "fs",
    "netfs",
    "disk",
    "scsi",
    "iscsi",
    "iscsi-direct",
    "mpath",
    "rbd",
    "sheepdog",
    "gluster",
    "zfs",
    "vstorage",
];

/// A validated storage pool definition, immutable once built.
#[derive(Debug, Clone)]
pub struct PoolDefinition {
    name: String,
    kind: PoolKind,
    target_path: Option<String>,
    source_devices: Vec<String>,
}

impl PoolDefinition {
    pub fn new(
        name: &str,
        kind: &str,
        target_path: Option<&str>,
        source_devices: &[String],
    ) -> Result<PoolDefinition> {
        match kind {
            "dir" => {
                let path = target_path.unwrap_or_default();
                if path.is_empty() {
                    return Err(PoolError::MissingPath);
                }
                Ok(PoolDefinition {
                    name: name.to_string(),
                    kind: PoolKind::Dir,
                    target_path: Some(path.to_string()),
                    source_devices: Vec::new(),
                })
            }
            "logical" => {
                if source_devices.is_empty() {
                    return Err(PoolError::MissingSourceDevices);
                }
                Ok(PoolDefinition {
                    name: name.to_string(),
                    kind: PoolKind::Logical,
                    target_path: None,
                    source_devices: source_devices.to_vec(),
                })
            }
            other if UNSUPPORTED_KINDS.contains(&other) => {
                Err(PoolError::UnsupportedType(other.to_string()))
            }
            other => Err(PoolError::UnrecognizedType(other.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn target_path(&self) -> Option<&str> {
        self.target_path.as_deref()
    }

    pub fn source_devices(&self) -> &[String] {
        &self.source_devices
    }

    /// Serializes to the daemon's indented pool document form.
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(&format!("<pool type='{}'>\n", self.kind));
        xml.push_str(&format!("  <name>{}</name>\n", escape(&self.name)));
        if !self.source_devices.is_empty() {
            xml.push_str("  <source>\n");
            for device in &self.source_devices {
                xml.push_str(&format!("    <device path='{}'/>\n", escape(device)));
            }
            xml.push_str("  </source>\n");
        }
        if let Some(path) = &self.target_path {
            xml.push_str("  <target>\n");
            xml.push_str(&format!("    <path>{}</path>\n", escape(path)));
            xml.push_str("  </target>\n");
        }
        xml.push_str("</pool>\n");
        xml
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

fn section<'a>(xml: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = xml.find(open)? + open.len();
    let end = xml[start..].find(close)? + start;
    Some(&xml[start..end])
}

/// Extracts the resolved target path from a daemon pool document, if any.
///
/// The daemon's documents carry far more vocabulary than basin generates;
/// only the two fields the controller reports back are pulled out, so a
/// full document model is not warranted here.
pub fn target_path_from_xml(xml: &str) -> Option<String> {
    let target = section(xml, "<target>", "</target>")?;
    let path = section(target, "<path>", "</path>")?.trim();
    if path.is_empty() {
        None
    } else {
        Some(unescape(path))
    }
}

/// Extracts the source device paths from a daemon pool document.
pub fn source_devices_from_xml(xml: &str) -> Vec<String> {
    let Some(source) = section(xml, "<source>", "</source>") else {
        return Vec::new();
    };
    let mut devices = Vec::new();
    let mut rest = source;
    while let Some(index) = rest.find("<device") {
        rest = &rest[index + "<device".len()..];
        let Some(end) = rest.find('>') else {
            break;
        };
        if let Some(path) = attribute(&rest[..end], "path") {
            devices.push(unescape(&path));
        }
        rest = &rest[end + 1..];
    }
    devices
}

/// Extracts the pool type attribute from a daemon pool document.
pub fn kind_from_xml(xml: &str) -> Option<String> {
    let start = xml.find("<pool")? + "<pool".len();
    let end = xml[start..].find('>')? + start;
    attribute(&xml[start..end], "type").map(|kind| unescape(&kind))
}

fn attribute(tag: &str, name: &str) -> Option<String> {
    let key = format!("{}=", name);
    let start = tag.find(&key)? + key.len();
    let rest = &tag[start..];
    let quote = rest.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_pool_requires_target_path() {
        assert!(matches!(
            PoolDefinition::new("pool1", "dir", None, &[]),
            Err(PoolError::MissingPath)
        ));
        assert!(matches!(
            PoolDefinition::new("pool1", "dir", Some(""), &[]),
            Err(PoolError::MissingPath)
        ));
        let definition = PoolDefinition::new("pool1", "dir", Some("/tmp/x"), &[]).unwrap();
        assert_eq!(definition.kind(), PoolKind::Dir);
        assert_eq!(definition.target_path(), Some("/tmp/x"));
    }

    #[test]
    fn logical_pool_requires_source_devices() {
        assert!(matches!(
            PoolDefinition::new("pool1", "logical", Some(""), &[]),
            Err(PoolError::MissingSourceDevices)
        ));
        let devices = vec!["/dev/loop0".to_string()];
        let definition = PoolDefinition::new("pool1", "logical", None, &devices).unwrap();
        assert_eq!(definition.kind(), PoolKind::Logical);
        assert_eq!(definition.source_devices(), devices.as_slice());
    }

    #[test]
    fn known_but_unsupported_types_are_distinguished() {
        assert!(matches!(
            PoolDefinition::new("pool1", "rbd", Some(""), &[]),
            Err(PoolError::UnsupportedType(kind)) if kind == "rbd"
        ));
        assert!(matches!(
            PoolDefinition::new("pool1", "zfs", None, &[]),
            Err(PoolError::UnsupportedType(_))
        ));
        assert!(matches!(
            PoolDefinition::new("pool1", "floppy", None, &[]),
            Err(PoolError::UnrecognizedType(kind)) if kind == "floppy"
        ));
    }

    #[test]
    fn dir_pool_document_shape() {
        let definition = PoolDefinition::new("pool1", "dir", Some("/tmp/x"), &[]).unwrap();
        let xml = definition.to_xml();
        assert!(xml.contains("<pool type='dir'>"));
        assert!(xml.contains("<name>pool1</name>"));
        assert!(xml.contains("<path>/tmp/x</path>"));
        assert!(!xml.contains("<source>"));
    }

    #[test]
    fn logical_pool_document_shape() {
        let devices = vec!["/dev/loop0".to_string(), "/dev/loop1".to_string()];
        let definition = PoolDefinition::new("vg0", "logical", None, &devices).unwrap();
        let xml = definition.to_xml();
        assert!(xml.contains("<pool type='logical'>"));
        assert!(xml.contains("<device path='/dev/loop0'/>"));
        assert!(xml.contains("<device path='/dev/loop1'/>"));
        assert!(!xml.contains("<target>"));
    }

    #[test]
    fn document_text_is_escaped() {
        let definition = PoolDefinition::new("a&b", "dir", Some("/tmp/<odd>'dir'"), &[]).unwrap();
        let xml = definition.to_xml();
        assert!(xml.contains("<name>a&amp;b</name>"));
        assert!(xml.contains("<path>/tmp/&lt;odd&gt;&apos;dir&apos;</path>"));
    }

    #[test]
    fn parses_daemon_document_fields() {
        let xml = concat!(
            "<pool type='logical'>\n",
            "  <name>vg0</name>\n",
            "  <uuid>5d9d4a8e-11a5-4b65-9b86-94b0bf44e0e9</uuid>\n",
            "  <capacity unit='bytes'>10485760</capacity>\n",
            "  <allocation unit='bytes'>0</allocation>\n",
            "  <available unit='bytes'>10485760</available>\n",
            "  <source>\n",
            "    <device path='/dev/loop0'/>\n",
            "    <device path=\"/dev/loop1\"/>\n",
            "  </source>\n",
            "  <target>\n",
            "    <path>/dev/vg0</path>\n",
            "  </target>\n",
            "</pool>\n",
        );
        assert_eq!(kind_from_xml(xml).as_deref(), Some("logical"));
        assert_eq!(target_path_from_xml(xml).as_deref(), Some("/dev/vg0"));
        assert_eq!(
            source_devices_from_xml(xml),
            vec!["/dev/loop0".to_string(), "/dev/loop1".to_string()]
        );
    }

    #[test]
    fn missing_document_fields_are_absent() {
        let xml = "<pool type='dir'>\n  <name>plain</name>\n</pool>\n";
        assert!(target_path_from_xml(xml).is_none());
        assert!(source_devices_from_xml(xml).is_empty());
    }
}
