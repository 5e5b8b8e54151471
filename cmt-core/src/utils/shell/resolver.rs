//! Command resolver for the shell.
//!
//! Matches a tokenized line against a static table of command shapes
//! (name, accepted field count, per-field kind constraints) and produces a
//! typed [`Command`]. An ill-formed line yields an [`InputError`], never a
//! partially-applied command. Case handling is already done upstream: the
//! console folds input to lower case before tokenizing.

use super::tokenizer::{FieldKind, FieldSet, MAX_FIELDS};

/// Indicator LED mode argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMode {
    On,
    Off,
    Sample,
}

/// Arm/disarm argument for `periodic`, `match` and `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Off,
    Value(u16),
}

/// Fully resolved operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    RgbSet { r: u16, g: u16, b: u16 },
    RgbOff,
    Light,
    Ramp,
    Test,
    Calibrate,
    Trigger,
    Button,
    Periodic(Setting),
    Led(LedMode),
    ColorSave { index: u16 },
    ColorShow { index: u16 },
    ColorErase { index: u16 },
    ColorList,
    Match(Setting),
    Delta(Setting),
    PromMenu,
    PromErase,
    PromShowColors,
    PromShowCalibration,
}

/// Why a line failed to resolve. Always recoverable: the shell reports a
/// status line and keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// No command shape matches the line.
    Unrecognized,
    /// A numeric argument is not a plain decimal in range (field index).
    BadNumber { field: usize },
    /// An alphabetic argument is not one of the accepted literals.
    BadLiteral { field: usize },
}

const A: FieldKind = FieldKind::Alpha;
const N: FieldKind = FieldKind::Numeric;

/// One accepted shape: total field count and the kinds of fields `1..`.
struct Shape {
    count: usize,
    kinds: &'static [FieldKind],
}

struct Entry {
    name: &'static str,
    shapes: &'static [Shape],
}

const NO_ARGS: &[Shape] = &[Shape {
    count: 1,
    kinds: &[],
}];

static TABLE: &[Entry] = &[
    Entry { name: "help", shapes: NO_ARGS },
    Entry { name: "menu", shapes: NO_ARGS },
    Entry {
        name: "rgb",
        shapes: &[
            Shape { count: 4, kinds: &[N, N, N] },
            Shape { count: 2, kinds: &[A] },
        ],
    },
    Entry { name: "light", shapes: NO_ARGS },
    Entry { name: "ramp", shapes: NO_ARGS },
    Entry { name: "test", shapes: NO_ARGS },
    Entry { name: "calibrate", shapes: NO_ARGS },
    Entry { name: "trigger", shapes: NO_ARGS },
    Entry { name: "button", shapes: NO_ARGS },
    Entry {
        name: "periodic",
        shapes: &[
            Shape { count: 2, kinds: &[N] },
            Shape { count: 2, kinds: &[A] },
        ],
    },
    Entry {
        name: "led",
        shapes: &[Shape { count: 2, kinds: &[A] }],
    },
    Entry {
        name: "color",
        shapes: &[Shape { count: 2, kinds: &[N] }],
    },
    Entry {
        name: "show",
        shapes: &[Shape { count: 2, kinds: &[N] }],
    },
    Entry {
        name: "erase",
        shapes: &[Shape { count: 2, kinds: &[N] }],
    },
    Entry {
        name: "match",
        shapes: &[
            Shape { count: 2, kinds: &[N] },
            Shape { count: 2, kinds: &[A] },
        ],
    },
    Entry {
        name: "delta",
        shapes: &[
            Shape { count: 2, kinds: &[N] },
            Shape { count: 2, kinds: &[A] },
        ],
    },
    Entry { name: "showcolors", shapes: NO_ARGS },
    Entry { name: "prommenu", shapes: NO_ARGS },
    Entry { name: "promerase", shapes: NO_ARGS },
    Entry { name: "promshowcolors", shapes: NO_ARGS },
    Entry { name: "promcalibration", shapes: NO_ARGS },
];

/// Strict decimal parse of a numeric field. Rejects `.`/`-`, empty text and
/// anything outside `u16`; malformed numbers are reported, never truncated
/// to a best-effort prefix.
fn parse_u16(
    line: &str,
    fields: &FieldSet<MAX_FIELDS>,
    field: usize,
) -> Result<u16, InputError> {
    let text = fields.text(line, field).unwrap_or("");
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InputError::BadNumber { field });
    }
    text.parse().map_err(|_| InputError::BadNumber { field })
}

/// Parse the arm/disarm argument of `periodic`/`match`/`delta`. Only the
/// literal `off` disarms; `zero_is_off` additionally maps a numeric 0 to
/// off (periodic semantics).
fn parse_setting(
    line: &str,
    fields: &FieldSet<MAX_FIELDS>,
    zero_is_off: bool,
) -> Result<Setting, InputError> {
    match fields.kind(1) {
        Some(FieldKind::Numeric) => {
            let value = parse_u16(line, fields, 1)?;
            if zero_is_off && value == 0 {
                Ok(Setting::Off)
            } else {
                Ok(Setting::Value(value))
            }
        }
        _ => {
            if fields.text(line, 1) == Some("off") {
                Ok(Setting::Off)
            } else {
                Err(InputError::BadLiteral { field: 1 })
            }
        }
    }
}

/// Resolve one tokenized line into a typed command.
pub fn resolve(
    line: &str,
    fields: &FieldSet<MAX_FIELDS>,
) -> Result<Command, InputError> {
    let name = match fields.text(line, 0) {
        Some(name) => name,
        None => return Err(InputError::Unrecognized),
    };

    let entry = TABLE
        .iter()
        .find(|e| e.name == name)
        .ok_or(InputError::Unrecognized)?;

    let shape_ok = entry.shapes.iter().any(|shape| {
        shape.count == fields.len()
            && shape
                .kinds
                .iter()
                .enumerate()
                .all(|(i, &kind)| fields.kind(i + 1) == Some(kind))
    });
    if !shape_ok {
        return Err(InputError::Unrecognized);
    }

    match name {
        "help" | "menu" => Ok(Command::Help),
        "rgb" => {
            if fields.len() == 4 {
                Ok(Command::RgbSet {
                    r: parse_u16(line, fields, 1)?,
                    g: parse_u16(line, fields, 2)?,
                    b: parse_u16(line, fields, 3)?,
                })
            } else if fields.text(line, 1) == Some("off") {
                Ok(Command::RgbOff)
            } else {
                Err(InputError::BadLiteral { field: 1 })
            }
        }
        "light" => Ok(Command::Light),
        "ramp" => Ok(Command::Ramp),
        "test" => Ok(Command::Test),
        "calibrate" => Ok(Command::Calibrate),
        "trigger" => Ok(Command::Trigger),
        "button" => Ok(Command::Button),
        "periodic" => Ok(Command::Periodic(parse_setting(line, fields, true)?)),
        "led" => match fields.text(line, 1) {
            Some("on") => Ok(Command::Led(LedMode::On)),
            Some("off") => Ok(Command::Led(LedMode::Off)),
            Some("sample") => Ok(Command::Led(LedMode::Sample)),
            _ => Err(InputError::BadLiteral { field: 1 }),
        },
        "color" => Ok(Command::ColorSave {
            index: parse_u16(line, fields, 1)?,
        }),
        "show" => Ok(Command::ColorShow {
            index: parse_u16(line, fields, 1)?,
        }),
        "erase" => Ok(Command::ColorErase {
            index: parse_u16(line, fields, 1)?,
        }),
        "match" => Ok(Command::Match(parse_setting(line, fields, false)?)),
        "delta" => Ok(Command::Delta(parse_setting(line, fields, false)?)),
        "showcolors" => Ok(Command::ColorList),
        "prommenu" => Ok(Command::PromMenu),
        "promerase" => Ok(Command::PromErase),
        "promshowcolors" => Ok(Command::PromShowColors),
        "promcalibration" => Ok(Command::PromShowCalibration),
        _ => Err(InputError::Unrecognized),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tokenizer::tokenize;
    use super::*;

    fn run(line: &str) -> Result<Command, InputError> {
        resolve(line, &tokenize(line))
    }

    #[test]
    fn rgb_set_and_off() {
        assert_eq!(
            run("rgb 10 20 30"),
            Ok(Command::RgbSet { r: 10, g: 20, b: 30 })
        );
        assert_eq!(run("rgb off"), Ok(Command::RgbOff));
    }

    #[test]
    fn rgb_wrong_arity_is_unrecognized() {
        assert_eq!(run("rgb 10 20"), Err(InputError::Unrecognized));
        assert_eq!(run("rgb"), Err(InputError::Unrecognized));
    }

    #[test]
    fn rgb_off_literal_is_checked() {
        assert_eq!(run("rgb dim"), Err(InputError::BadLiteral { field: 1 }));
    }

    #[test]
    fn unknown_name_is_unrecognized() {
        assert_eq!(run("frobnicate"), Err(InputError::Unrecognized));
        assert_eq!(run("123"), Err(InputError::Unrecognized));
    }

    #[test]
    fn no_arg_commands_reject_extra_fields() {
        assert_eq!(run("calibrate"), Ok(Command::Calibrate));
        assert_eq!(run("calibrate now"), Err(InputError::Unrecognized));
    }

    #[test]
    fn periodic_settings() {
        assert_eq!(run("periodic 5"), Ok(Command::Periodic(Setting::Value(5))));
        assert_eq!(run("periodic 0"), Ok(Command::Periodic(Setting::Off)));
        assert_eq!(run("periodic off"), Ok(Command::Periodic(Setting::Off)));
        assert_eq!(
            run("periodic banana"),
            Err(InputError::BadLiteral { field: 1 })
        );
    }

    #[test]
    fn match_and_delta_keep_zero_armed() {
        assert_eq!(run("match 0"), Ok(Command::Match(Setting::Value(0))));
        assert_eq!(run("delta off"), Ok(Command::Delta(Setting::Off)));
    }

    #[test]
    fn led_literals() {
        assert_eq!(run("led sample"), Ok(Command::Led(LedMode::Sample)));
        assert_eq!(run("led blink"), Err(InputError::BadLiteral { field: 1 }));
    }

    #[test]
    fn strict_numeric_parsing() {
        assert_eq!(run("color 3"), Ok(Command::ColorSave { index: 3 }));
        assert_eq!(run("color 1a"), Err(InputError::BadNumber { field: 1 }));
        assert_eq!(run("color -1"), Err(InputError::BadNumber { field: 1 }));
        assert_eq!(
            run("color 99999"),
            Err(InputError::BadNumber { field: 1 })
        );
    }

    #[test]
    fn prom_surface_resolves() {
        assert_eq!(run("prommenu"), Ok(Command::PromMenu));
        assert_eq!(run("promcalibration"), Ok(Command::PromShowCalibration));
        assert_eq!(run("showcolors"), Ok(Command::ColorList));
    }
}
