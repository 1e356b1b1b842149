//! The mapper contract.

use elr_model::{Element, Metadata};

use crate::error::{MapperError, Result};

/// A resolved input handed to a mapper.
#[derive(Debug, Clone, Copy)]
pub struct ElementValue<'a> {
    pub element: &'a Element,
    pub value: &'a str,
}

/// Derives one element's value from other, already-resolved elements.
///
/// Implementations are stateless and shared across threads.
pub trait Mapper: Send + Sync {
    fn name(&self) -> &'static str;

    /// Names of the elements whose values `apply` consumes.
    ///
    /// Also validates the argument list; the default consumes every argument.
    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        let _ = element;
        Ok(args.to_vec())
    }

    /// Compute the value. `values` holds the non-blank inputs named by
    /// [`value_names`](Self::value_names), in that order.
    fn apply(
        &self,
        element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        metadata: &Metadata,
    ) -> Result<Option<String>>;
}

/// Value of the input named `name`, if it was resolved.
pub fn value_of<'a>(values: &[ElementValue<'a>], name: &str) -> Option<&'a str> {
    values
        .iter()
        .find(|value| value.element.name == name)
        .map(|value| value.value)
}

pub(crate) fn expect_args(
    mapper: &'static str,
    element: &Element,
    args: &[String],
    min: usize,
    max: Option<usize>,
) -> Result<()> {
    let too_many = max.is_some_and(|max| args.len() > max);
    if args.len() < min || too_many {
        let expected = match max {
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{min}..={max}"),
            None => format!("at least {min}"),
        };
        return Err(MapperError::ArgumentCount {
            mapper,
            element: element.name.clone(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}
