//! Procedural macros for on-device TAP testing in reachability-rs-esp32.
//!
//! Provides `#[tap_test]`, which registers a function with the crate's
//! `testing` harness so the `device-tests` binary can run it on the host,
//! under QEMU, or on a board.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, Error, Expr, ExprLit, ItemFn, Lit, Meta, ReturnType};

/// Register a function as a TAP test.
///
/// The function either returns nothing (a panic is a failure) or returns a
/// `Result` (an `Err` is a failure).
///
/// # Attributes
///
/// - `#[tap_test]`
/// - `#[tap_test(should_panic)]`
/// - `#[tap_test(should_panic = "fragment of the panic message")]`
///
/// # Example
///
/// ```ignore
/// use reachability_rs_esp32_macros::tap_test;
///
/// #[tap_test]
/// fn ring_wraps() {
///     let ring = RotationRing::new(["a", "b"]).unwrap();
///     let mut it = ring.iterator();
///     it.advance();
///     assert_eq!(*it.advance(), "a");
/// }
/// ```
#[proc_macro_attribute]
pub fn tap_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(item as ItemFn);

    let expectation = if attr.is_empty() {
        Expectation::Completes
    } else {
        match parse_expectation(parse_macro_input!(attr as Meta)) {
            Ok(expectation) => expectation,
            Err(e) => return e.to_compile_error().into(),
        }
    };

    let fn_name = &input_fn.sig.ident;
    let fn_name_str = fn_name.to_string();
    let returns_result = matches!(input_fn.sig.output, ReturnType::Type(_, _));

    let run = match expectation {
        Expectation::Completes if returns_result => quote! {
            runner.run(#fn_name_str, #fn_name);
        },
        Expectation::Completes => quote! {
            runner.run_assert(#fn_name_str, #fn_name);
        },
        Expectation::Panics(None) => quote! {
            runner.run_should_panic(#fn_name_str, #fn_name, None);
        },
        Expectation::Panics(Some(msg)) => quote! {
            runner.run_should_panic(#fn_name_str, #fn_name, Some(#msg));
        },
    };

    let expanded = quote! {
        #input_fn

        ::inventory::submit! {
            ::reachability_rs_esp32::testing::TapTestEntry::new(
                #fn_name_str,
                |runner: &mut ::reachability_rs_esp32::testing::TestRunner| {
                    #run
                }
            )
        }
    };

    TokenStream::from(expanded)
}

enum Expectation {
    Completes,
    Panics(Option<String>),
}

fn parse_expectation(meta: Meta) -> Result<Expectation, Error> {
    match meta {
        Meta::Path(path) if path.is_ident("should_panic") => Ok(Expectation::Panics(None)),
        Meta::NameValue(nv) if nv.path.is_ident("should_panic") => match nv.value {
            Expr::Lit(ExprLit {
                lit: Lit::Str(s), ..
            }) => Ok(Expectation::Panics(Some(s.value()))),
            other => Err(Error::new_spanned(
                other,
                "tap_test: should_panic expects a string literal",
            )),
        },
        other => Err(Error::new(
            Span::call_site(),
            format!(
                "tap_test: unsupported attribute `{}`; use should_panic or should_panic = \"message\"",
                quote!(#other)
            ),
        )),
    }
}
