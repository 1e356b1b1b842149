//! Built-in mappers.

use chrono::Utc;
use elr_model::normalize::{DATETIME_PATTERN, PhoneNumber};
use elr_model::{Element, Metadata};

use crate::error::{MapperError, Result};
use crate::mapper::{ElementValue, Mapper, expect_args, value_of};

/// First resolved argument, in argument order: `use(a, b, ...)`.
pub struct UseMapper;

impl Mapper for UseMapper {
    fn name(&self) -> &'static str {
        "use"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 1, None)?;
        Ok(args.to_vec())
    }

    fn apply(
        &self,
        _element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        Ok(first_present(args, values))
    }
}

/// Same as `use`; kept under its own name for schemas that spell it this way.
pub struct CoalesceMapper;

impl Mapper for CoalesceMapper {
    fn name(&self) -> &'static str {
        "coalesce"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 1, None)?;
        Ok(args.to_vec())
    }

    fn apply(
        &self,
        _element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        Ok(first_present(args, values))
    }
}

fn first_present(args: &[String], values: &[ElementValue<'_>]) -> Option<String> {
    args.iter()
        .find_map(|name| value_of(values, name))
        .map(str::to_string)
}

/// Joins resolved arguments with the element delimiter (default `", "`).
pub struct ConcatMapper;

impl Mapper for ConcatMapper {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 1, None)?;
        Ok(args.to_vec())
    }

    fn apply(
        &self,
        element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        let parts: Vec<&str> = args
            .iter()
            .filter_map(|name| value_of(values, name))
            .collect();
        if parts.is_empty() {
            return Ok(None);
        }
        let delimiter = element.delimiter.as_deref().unwrap_or(", ");
        Ok(Some(parts.join(delimiter)))
    }
}

/// Uppercased first letter of a name.
pub struct MiddleInitialMapper;

impl Mapper for MiddleInitialMapper {
    fn name(&self) -> &'static str {
        "middleInitial"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 1, Some(1))?;
        Ok(args.to_vec())
    }

    fn apply(
        &self,
        _element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        Ok(value_of(values, &args[0])
            .and_then(|name| name.trim().chars().next())
            .map(|initial| initial.to_uppercase().to_string()))
    }
}

/// `ifPresent(element, literal)`: the literal when `element` has a value.
pub struct IfPresentMapper;

impl Mapper for IfPresentMapper {
    fn name(&self) -> &'static str {
        "ifPresent"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 2, Some(2))?;
        Ok(vec![args[0].clone()])
    }

    fn apply(
        &self,
        _element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        Ok(value_of(values, &args[0]).map(|_| args[1].clone()))
    }
}

/// `ifNotPresent(literal, a, b, ...)`: the literal when none of the elements has a value.
pub struct IfNotPresentMapper;

impl Mapper for IfNotPresentMapper {
    fn name(&self) -> &'static str {
        "ifNotPresent"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 2, None)?;
        Ok(args[1..].to_vec())
    }

    fn apply(
        &self,
        _element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        let any_present = args[1..].iter().any(|name| value_of(values, name).is_some());
        Ok((!any_present).then(|| args[0].clone()))
    }
}

/// `ifThenElse(op, element, literal, then, else)`.
///
/// Compares `element` against `literal` with `op` (`==`, `!=`, `<`, `<=`,
/// `>`, `>=`); the result is the value of `then`/`else` when those name a
/// resolved element, otherwise the argument text itself.
pub struct IfThenElseMapper;

impl IfThenElseMapper {
    fn compare(op: &str, left: &str, right: &str) -> Option<bool> {
        match op {
            "==" => Some(left.eq_ignore_ascii_case(right)),
            "!=" => Some(!left.eq_ignore_ascii_case(right)),
            _ => {
                let left: f64 = left.trim().parse().ok()?;
                let right: f64 = right.trim().parse().ok()?;
                match op {
                    "<" => Some(left < right),
                    "<=" => Some(left <= right),
                    ">" => Some(left > right),
                    ">=" => Some(left >= right),
                    _ => None,
                }
            }
        }
    }
}

impl Mapper for IfThenElseMapper {
    fn name(&self) -> &'static str {
        "ifThenElse"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 5, Some(5))?;
        if !matches!(args[0].as_str(), "==" | "!=" | "<" | "<=" | ">" | ">=") {
            return Err(MapperError::InvalidArgument {
                mapper: self.name(),
                element: element.name.clone(),
                message: format!("unsupported comparison '{}'", args[0]),
            });
        }
        Ok(vec![args[1].clone(), args[3].clone(), args[4].clone()])
    }

    fn apply(
        &self,
        _element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        let Some(subject) = value_of(values, &args[1]) else {
            return Ok(None);
        };
        let branch = match Self::compare(&args[0], subject, &args[2]) {
            Some(true) => &args[3],
            Some(false) => &args[4],
            None => return Ok(None),
        };
        Ok(Some(
            value_of(values, branch).map_or_else(|| branch.clone(), str::to_string),
        ))
    }
}

/// Trims surrounding whitespace; all-blank input maps to nothing.
pub struct TrimBlanksMapper;

impl Mapper for TrimBlanksMapper {
    fn name(&self) -> &'static str {
        "trimBlanks"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 1, Some(1))?;
        Ok(args.to_vec())
    }

    fn apply(
        &self,
        _element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        Ok(value_of(values, &args[0])
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string))
    }
}

/// Normalized telephone (`digits:1:`) from free-form input.
pub struct StripPhoneFormattingMapper;

impl Mapper for StripPhoneFormattingMapper {
    fn name(&self) -> &'static str {
        "stripPhoneFormatting"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 1, Some(1))?;
        Ok(args.to_vec())
    }

    fn apply(
        &self,
        _element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        let Some(raw) = value_of(values, &args[0]) else {
            return Ok(None);
        };
        if let Some(phone) = PhoneNumber::parse(raw) {
            return Ok(Some(phone.to_normalized()));
        }
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        Ok((!digits.is_empty()).then(|| format!("{digits}:1:")))
    }
}

/// Keeps only digits.
pub struct StripNonNumericMapper;

impl Mapper for StripNonNumericMapper {
    fn name(&self) -> &'static str {
        "stripNonNumeric"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 1, Some(1))?;
        Ok(args.to_vec())
    }

    fn apply(
        &self,
        _element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        Ok(value_of(values, &args[0])
            .map(|value| value.chars().filter(char::is_ascii_digit).collect::<String>())
            .filter(|value| !value.is_empty()))
    }
}

/// Removes digits.
pub struct StripNumericMapper;

impl Mapper for StripNumericMapper {
    fn name(&self) -> &'static str {
        "stripNumeric"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 1, Some(1))?;
        Ok(args.to_vec())
    }

    fn apply(
        &self,
        _element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        Ok(value_of(values, &args[0])
            .map(|value| {
                value
                    .chars()
                    .filter(|c| !c.is_ascii_digit())
                    .collect::<String>()
                    .trim()
                    .to_string()
            })
            .filter(|value| !value.is_empty()))
    }
}

/// `split(element, index[, delimiter])`; delimiter defaults to a space.
pub struct SplitMapper;

impl Mapper for SplitMapper {
    fn name(&self) -> &'static str {
        "split"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 2, Some(3))?;
        parse_index(self.name(), element, &args[1])?;
        Ok(vec![args[0].clone()])
    }

    fn apply(
        &self,
        element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        let index = parse_index(self.name(), element, &args[1])?;
        let delimiter = args.get(2).map_or(" ", String::as_str);
        Ok(split_part(value_of(values, &args[0]), delimiter, index))
    }
}

/// `splitByComma(element, index)`.
pub struct SplitByCommaMapper;

impl Mapper for SplitByCommaMapper {
    fn name(&self) -> &'static str {
        "splitByComma"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 2, Some(2))?;
        parse_index(self.name(), element, &args[1])?;
        Ok(vec![args[0].clone()])
    }

    fn apply(
        &self,
        element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        let index = parse_index(self.name(), element, &args[1])?;
        Ok(split_part(value_of(values, &args[0]), ",", index))
    }
}

fn parse_index(mapper: &'static str, element: &Element, arg: &str) -> Result<usize> {
    arg.trim()
        .parse()
        .map_err(|_| MapperError::InvalidArgument {
            mapper,
            element: element.name.clone(),
            message: format!("'{arg}' is not an index"),
        })
}

fn split_part(value: Option<&str>, delimiter: &str, index: usize) -> Option<String> {
    value?
        .split(delimiter)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .nth(index)
        .map(str::to_string)
}

/// Current time in the normalized date-time form.
pub struct TimestampMapper;

impl Mapper for TimestampMapper {
    fn name(&self) -> &'static str {
        "timestamp"
    }

    fn value_names(&self, _element: &Element, _args: &[String]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn apply(
        &self,
        _element: &Element,
        _args: &[String],
        _values: &[ElementValue<'_>],
        _metadata: &Metadata,
    ) -> Result<Option<String>> {
        Ok(Some(Utc::now().format(DATETIME_PATTERN).to_string()))
    }
}

/// `lookup(element)`: maps a display value onto the target element's value set code.
pub struct LookupMapper;

impl Mapper for LookupMapper {
    fn name(&self) -> &'static str {
        "lookup"
    }

    fn value_names(&self, element: &Element, args: &[String]) -> Result<Vec<String>> {
        expect_args(self.name(), element, args, 1, Some(1))?;
        if element.value_set.is_none() {
            return Err(MapperError::InvalidArgument {
                mapper: self.name(),
                element: element.name.clone(),
                message: "target element declares no value set".to_string(),
            });
        }
        Ok(args.to_vec())
    }

    fn apply(
        &self,
        element: &Element,
        args: &[String],
        values: &[ElementValue<'_>],
        metadata: &Metadata,
    ) -> Result<Option<String>> {
        let Some(display) = value_of(values, &args[0]) else {
            return Ok(None);
        };
        let Some(set) = metadata.element_value_set(element)? else {
            return Ok(None);
        };
        Ok(set
            .to_code_from_display(display)
            .or_else(|| set.to_normalized_code(display))
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elr_model::ElementType;

    fn run(mapper: &dyn Mapper, target: &Element, args: &[&str], inputs: &[(&str, &str)]) -> Option<String> {
        let args: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
        let elements: Vec<Element> = inputs
            .iter()
            .map(|(name, _)| Element::new(*name, ElementType::Text))
            .collect();
        let values: Vec<ElementValue<'_>> = elements
            .iter()
            .zip(inputs)
            .map(|(element, (_, value))| ElementValue { element, value })
            .collect();
        mapper.value_names(target, &args).expect("valid args");
        mapper
            .apply(target, &args, &values, &Metadata::new())
            .expect("apply")
    }

    fn target() -> Element {
        Element::new("target", ElementType::Text)
    }

    #[test]
    fn test_use_takes_first_in_argument_order() {
        let got = run(&UseMapper, &target(), &["b", "a"], &[("a", "1"), ("b", "2")]);
        assert_eq!(got.as_deref(), Some("2"));
        assert_eq!(run(&UseMapper, &target(), &["c"], &[("a", "1")]), None);
    }

    #[test]
    fn test_concat() {
        let got = run(&ConcatMapper, &target(), &["a", "b", "c"], &[("a", "x"), ("c", "z")]);
        assert_eq!(got.as_deref(), Some("x, z"));
    }

    #[test]
    fn test_middle_initial() {
        let got = run(&MiddleInitialMapper, &target(), &["m"], &[("m", "robert")]);
        assert_eq!(got.as_deref(), Some("R"));
    }

    #[test]
    fn test_presence_mappers() {
        assert_eq!(
            run(&IfPresentMapper, &target(), &["a", "Y"], &[("a", "1")]).as_deref(),
            Some("Y")
        );
        assert_eq!(run(&IfPresentMapper, &target(), &["a", "Y"], &[]), None);
        assert_eq!(
            run(&IfNotPresentMapper, &target(), &["UNK", "a", "b"], &[]).as_deref(),
            Some("UNK")
        );
        assert_eq!(
            run(&IfNotPresentMapper, &target(), &["UNK", "a", "b"], &[("b", "x")]),
            None
        );
    }

    #[test]
    fn test_if_then_else() {
        let args = ["<=", "age", "17", "minor", "adult"];
        let got = run(&IfThenElseMapper, &target(), &args, &[("age", "12")]);
        assert_eq!(got.as_deref(), Some("minor"));
        let got = run(
            &IfThenElseMapper,
            &target(),
            &args,
            &[("age", "40"), ("adult", "A")],
        );
        assert_eq!(got.as_deref(), Some("A"));
    }

    #[test]
    fn test_if_then_else_rejects_unknown_operator() {
        let args: Vec<String> = ["~", "a", "b", "c", "d"].iter().map(|a| (*a).to_string()).collect();
        assert!(IfThenElseMapper.value_names(&target(), &args).is_err());
    }

    #[test]
    fn test_strip_mappers() {
        assert_eq!(
            run(&StripPhoneFormattingMapper, &target(), &["p"], &[("p", "(555) 555-1234")]).as_deref(),
            Some("5555551234:1:")
        );
        assert_eq!(
            run(&StripNonNumericMapper, &target(), &["p"], &[("p", "a1b2")]).as_deref(),
            Some("12")
        );
        assert_eq!(
            run(&StripNumericMapper, &target(), &["p"], &[("p", "Apt 12")]).as_deref(),
            Some("Apt")
        );
    }

    #[test]
    fn test_split() {
        assert_eq!(
            run(&SplitMapper, &target(), &["n", "1"], &[("n", "Jane Q Doe")]).as_deref(),
            Some("Q")
        );
        assert_eq!(
            run(&SplitByCommaMapper, &target(), &["n", "0"], &[("n", "Doe, Jane")]).as_deref(),
            Some("Doe")
        );
        assert_eq!(run(&SplitMapper, &target(), &["n", "5"], &[("n", "a b")]), None);
    }

    #[test]
    fn test_argument_count_checked() {
        let err = MiddleInitialMapper
            .value_names(&target(), &[])
            .unwrap_err();
        assert!(matches!(err, MapperError::ArgumentCount { .. }));
    }
}
