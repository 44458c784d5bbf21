/// Declares a closed status enumeration with its wire strings.
///
/// Every status field in the board (project, task, issue, custom section
/// type) is a small set of kebab-case strings shared by the store, the JSON
/// output and the command line. This macro generates, for one such set:
///
/// - the enum itself, deriving `Serialize`/`Deserialize` with kebab-case names
///   and `Default` (the first listed variant is the default),
/// - `ALL`, every variant in declaration order,
/// - `as_str()`, returning the wire string,
/// - `Display` and `FromStr`. Parsing is case-insensitive and accepts `_`
///   in place of `-`, so `IN_PROGRESS` and `in-progress` are the same.
///
/// # Example
/// ```ignore
/// status_enum!(
///     /// Lifecycle of a project.
///     ProjectStatus {
///         Planned => "planned",
///         Active => "active",
///         Completed => "completed",
///     }
/// );
/// ```
///
/// # Notes
/// - The literal for each variant must match the serde kebab-case rendering of
///   the variant name, otherwise `as_str()` and serialization disagree.
macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, Hash,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            #[default]
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        format!("Unknown value '{s}' (expected one of: {})", allowed.join(", "))
                    })
            }
        }
    };
}
