// timelog-macros/src/lib.rs
extern crate proc_macro;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, quote_spanned};
use syn::{Error, Expr, Ident, ItemFn, Token, parse::Parse, punctuated::Punctuated, spanned::Spanned};

/// Keys accepted by `#[timed(...)]`; each maps onto the `Timer` builder
/// method of the same name.
const OPTIONS: &[&str] = &[
    "level",
    "enable",
    "output",
    "log_dir",
    "log_file",
    "extra_msg",
    "fmt",
    "datefmt",
    "logger_name",
    "rotate",
    "max_bytes",
    "backup_count",
    "registry",
];

// Parser for a single `key = value` option
struct TimerOption {
    key: Ident,
    value: Expr,
}

impl Parse for TimerOption {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let key: Ident = input.parse()?;
        if !input.peek(Token![=]) {
            return Err(create_error(
                key.span(),
                &format!("expected `{key} = <value>`"),
                Some("options are written as `key = value`, e.g. `#[timed(log_file = \"run.log\")]`"),
            ));
        }
        input.parse::<Token![=]>()?;
        let value: Expr = input.parse()?;
        Ok(TimerOption { key, value })
    }
}

// Parser for comma-separated options
struct OptionList {
    options: Punctuated<TimerOption, Token![,]>,
}

impl Parse for OptionList {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        Ok(OptionList {
            options: Punctuated::parse_terminated(input)?,
        })
    }
}

// Helper function to create decorated error messages
fn create_error(span: proc_macro2::Span, message: &str, help: Option<&str>) -> Error {
    let mut err = Error::new(span, message);
    if let Some(help_msg) = help {
        err.combine(Error::new(span, help_msg));
    }
    err
}

fn validate_options(list: &OptionList) -> syn::Result<()> {
    let mut seen: Vec<String> = Vec::new();
    for option in &list.options {
        let key = option.key.to_string();
        if !OPTIONS.contains(&key.as_str()) {
            return Err(create_error(
                option.key.span(),
                &format!("unknown `timed` option `{key}`"),
                Some(&format!("expected one of: {}", OPTIONS.join(", "))),
            ));
        }
        if seen.contains(&key) {
            return Err(create_error(
                option.key.span(),
                &format!("duplicate `timed` option `{key}`"),
                None,
            ));
        }
        seen.push(key);
    }
    Ok(())
}

fn expand(attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    let option_list: OptionList = syn::parse2(attr)?;
    validate_options(&option_list)?;

    let input_fn: ItemFn = syn::parse2(item)?;

    // Validate function signature
    if input_fn.sig.constness.is_some() {
        return Err(create_error(
            input_fn.sig.constness.span(),
            "Cannot time const functions",
            Some("The timed attribute cannot be used with const functions"),
        ));
    }

    let attrs = &input_fn.attrs;
    let vis = &input_fn.vis;
    let sig = &input_fn.sig;
    let body = &input_fn.block;
    let name = sig.ident.to_string();
    let line = quote_spanned!(sig.ident.span()=> ::core::line!());

    let enable = option_list
        .options
        .iter()
        .find(|option| option.key == "enable")
        .map(|option| {
            let value = &option.value;
            quote_spanned!(value.span()=> #value)
        })
        .unwrap_or_else(|| quote!(true));

    let setters = option_list
        .options
        .iter()
        .filter(|option| option.key != "enable")
        .map(|option| {
            let key = &option.key;
            let value = &option.value;
            quote_spanned!(value.span()=> .#key(#value))
        });

    // The guard is created when the body starts running, which for an async
    // fn is its first poll, and dropped after the body's value is produced,
    // so one expansion covers sync and async fns alike. Option values other
    // than `enable` are only evaluated when timing is on.
    let guard = quote! {
        let __timelog_enable: bool = #enable;
        let __timelog_guard = if ::timelog::env::enabled(__timelog_enable) {
            fn __timelog_site() {}
            ::timelog::Timer::new()
                .enable(__timelog_enable)
                #(#setters)*
                .enter_fn(&::timelog::FnSite {
                    module: ::core::module_path!(),
                    name: #name,
                    path: ::core::any::type_name_of_val(&__timelog_site),
                    file: ::core::file!(),
                    line: #line,
                    manifest_dir: ::core::env!("CARGO_MANIFEST_DIR"),
                })
        } else {
            ::timelog::TimingGuard::disabled()
        };
    };

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #guard
            #body
        }
    };

    Ok(output)
}

/// Times every call of a function and writes the elapsed time to a log.
///
/// Works on free functions, methods, generic functions and `async fn`s.
/// Each call writes one record such as
/// `Ran load in 3.127 ms (module=app, file=main.rs, abs=..., line=12, pid=..., thread=main)`,
/// including calls that return early, return an `Err`, or panic. The
/// function's return value and any panic pass through unchanged.
///
/// # Arguments
///
/// Comma-separated `key = value` pairs, each forwarded to the `timelog::Timer`
/// builder method of the same name: `level`, `enable`, `output`, `log_dir`,
/// `log_file`, `extra_msg`, `fmt`, `datefmt`, `logger_name`, `rotate`,
/// `max_bytes`, `backup_count`, `registry`.
///
/// # Examples
///
/// Basic usage, logging to `<source file stem>.log` next to the source:
/// ```rust,ignore
/// use timelog::timed;
///
/// #[timed]
/// fn add(x: i32, y: i32) -> i32 {
///     x + y
/// }
/// ```
///
/// With options:
/// ```rust,ignore
/// use timelog::{LogLevel, timed};
///
/// #[timed(level = LogLevel::Debug, log_dir = "logs", log_file = "math.log", extra_msg = "hot path")]
/// fn multiply(x: i32, y: i32) -> i32 {
///     x * y
/// }
/// ```
///
/// Async functions are timed from first poll to completion:
/// ```rust,ignore
/// use timelog::timed;
///
/// #[timed(log_file = "/var/log/app/fetch.log")]
/// async fn fetch(id: u64) -> Option<String> {
///     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
///     Some(format!("item-{id}"))
/// }
/// ```
///
/// Using with struct methods:
/// ```rust,ignore
/// use timelog::timed;
///
/// struct Counter {
///     value: i32,
/// }
///
/// impl Counter {
///     // logged as `Counter::increment`
///     #[timed(rotate = true, max_bytes = 1024 * 1024)]
///     pub fn increment(&mut self) -> i32 {
///         self.value += 1;
///         self.value
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn timed(attr: TokenStream, item: TokenStream) -> TokenStream {
    match expand(attr.into(), item.into()) {
        Ok(output) => output.into(),
        Err(e) => TokenStream::from(e.to_compile_error()),
    }
}
