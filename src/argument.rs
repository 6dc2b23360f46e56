//! Positional parameter descriptors.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::util::camel_case;
use crate::value::{Value, ValueKind};

/// Consumer-supplied validation run after a raw token coerces successfully.
pub type Validator = Rc<dyn Fn(&Value) -> anyhow::Result<()>>;

/// An ordered positional parameter declared on a context.
#[derive(Clone, Default)]
pub struct Argument {
    pub name: String,
    pub desc: Option<String>,
    pub required: bool,
    /// Absorbs every remaining positional; must be the last argument.
    pub multiple: bool,
    pub kind: ValueKind,
    pub default: Option<Value>,
    pub hidden: bool,
    pub validator: Option<Validator>,
}

impl Argument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn validator(mut self, validator: impl Fn(&Value) -> anyhow::Result<()> + 'static) -> Self {
        self.validator = Some(Rc::new(validator));
        self
    }

    /// Key under which a bound value lands in `argv`.
    pub fn camel_name(&self) -> String {
        camel_case(&self.name)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "argument name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argument")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("multiple", &self.multiple)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .finish()
    }
}

/// Check the order invariants before appending `arg` to `existing`:
/// no required argument may follow an optional one, and a `multiple`
/// argument must be last.
pub(crate) fn check_order(existing: &[Argument], arg: &Argument) -> Result<()> {
    arg.validate()?;
    if let Some(last) = existing.last() {
        if last.multiple {
            return Err(Error::InvalidArgument(format!(
                "argument {:?} cannot follow multiple argument {:?}",
                arg.name, last.name
            )));
        }
    }
    if arg.required && existing.iter().any(|a| !a.required) {
        return Err(Error::InvalidArgument(format!(
            "required argument {:?} cannot follow an optional argument",
            arg.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_after_optional_is_rejected() {
        let existing = vec![Argument::new("first").required(false)];
        let err = check_order(&existing, &Argument::new("second").required(true)).unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn nothing_may_follow_a_multiple_argument() {
        let existing = vec![Argument::new("rest").multiple(true)];
        let err = check_order(&existing, &Argument::new("late")).unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn camel_name_derives_from_kebab() {
        assert_eq!(Argument::new("src-dir").camel_name(), "srcDir");
    }
}
