/**
 * utils/macros.rs
 *
 * Small macros shared by the config and validation code.
 * Everything is bundled in a single file because rust macros don't have namespaces
 *
 **/

macro_rules! within_bounds_incl {
    ($low: expr, $num: expr, $high: expr) => {

        $num >= $low && $num <= $high
    }
}

/// Generates the getter functions serde needs for `#[serde(default = "...")]`
macro_rules! make_default {
    ($($field: ident ~ $rettype: ty = $value: expr), *) => {
        $(
        #[inline]
        pub fn $field() -> $rettype {
            $value.into()
        }
        )*
    }
}
