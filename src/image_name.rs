//! Validation of container image references, following the grammar of the container distribution
//! project:
//!
//! ```text
//! reference         := name [ ":" tag ] [ "@" digest ]
//! name              := [domain '/'] path-component ['/' path-component]*
//! domain            := domain-component ['.' domain-component]* [':' port-number]
//! domain-component  := /([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])/
//! port-number       := /[0-9]+/
//! path-component    := alpha-numeric [separator alpha-numeric]*
//! alpha-numeric     := /[a-z0-9]+/
//! separator         := /[_.]|__|[-]*/
//! tag               := /[\w][\w.-]{0,127}/
//! digest            := digest-algorithm ":" digest-hex
//! digest-algorithm  := /[A-Za-z][A-Za-z0-9]*([-_+.][A-Za-z][A-Za-z0-9]*)*/
//! digest-hex        := /[0-9a-fA-F]{32,}/
//! ```

use std::{fmt, sync::LazyLock};

use regex::Regex;

/// Names longer than this are rejected by registries.
const NAME_TOTAL_LENGTH_MAX: usize = 255;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    let domain_component = r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])";
    let domain = format!(r"{domain_component}(?:\.{domain_component})*(?::[0-9]+)?");
    let path_component = r"[a-z0-9]+(?:(?:[_.]|__|[-]*)[a-z0-9]+)*";
    let name = format!(r"(?:{domain}/)?{path_component}(?:/{path_component})*");
    let tag = r"[\w][\w.-]{0,127}";
    let digest = r"[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{32,}";
    Regex::new(&format!(r"^({name})(?::{tag})?(?:@{digest})?$")).unwrap()
});

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidImageName(String);

impl std::error::Error for InvalidImageName {}

impl fmt::Display for InvalidImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid container image name: {:?}", self.0)
    }
}

pub fn validate(reference: &str) -> Result<(), InvalidImageName> {
    let invalid = || InvalidImageName(reference.to_owned());
    let captures = REFERENCE.captures(reference).ok_or_else(invalid)?;
    if captures[1].len() > NAME_TOTAL_LENGTH_MAX {
        return Err(invalid());
    }
    Ok(())
}
