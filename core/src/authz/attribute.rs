/// An authorization attribute as passed to a voter. Either a bare operation
/// (`edit`, checked against the entity's root namespace) or a dotted
/// `<base>.<operation>` (`name.edit`, checked against `<namespace>_<base>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub base: Option<&'a str>,
    pub operation: &'a str,
}

impl<'a> Attribute<'a> {
    /// Parses a raw attribute. Returns `None` for empty segments or more than
    /// one dot, which voters treat as unsupported.
    pub fn parse(raw: &'a str) -> Option<Self> {
        match raw.split_once('.') {
            Some((base, operation)) => {
                if base.is_empty() || operation.is_empty() || operation.contains('.') {
                    None
                } else {
                    Some(Attribute {
                        base: Some(base),
                        operation,
                    })
                }
            }
            None if raw.is_empty() => None,
            None => Some(Attribute {
                base: None,
                operation: raw,
            }),
        }
    }

    /// Name of the permission set this attribute targets within `namespace`.
    pub fn permission_name(&self, namespace: &str) -> String {
        match self.base {
            Some(base) => format!("{namespace}_{base}"),
            None => namespace.to_string(),
        }
    }
}
