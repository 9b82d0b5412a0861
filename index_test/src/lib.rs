use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Run a test against a file-backed vote index in a fresh temporary
/// directory, and ensure that the directory is removed regardless of how the
/// test terminates.
///
/// Injectable dependencies are [`crate::index::VoteIndex`] and the directory
/// itself as a [`std::path::PathBuf`]. The index file is `<dir>/index.json`.
///
/// With `#[index_test(seeded)]`, the active and closed example votes are
/// created before the test runs. Test logging is always enabled.
#[proc_macro_attribute]
pub fn index_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the injected arguments and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the inner function so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_inner", name);
    item_fn.sig.ident = new_name.clone();

    // Seed the index with example votes if asked.
    let maybe_seed = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "seeded" => quote! {
            index
                .create_vote(crate::model::vote::Vote::active_example())
                .unwrap();
            index
                .create_vote(crate::model::vote::Vote::closed_example())
                .unwrap();
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `seeded` or no argument")
                .into_compile_error()
                .into();
        }
        None => quote! {},
    };

    // Rewrite the test function.
    quote! {
        #[test]
        #[allow(unused_variables)]
        fn #name() {
            /// Test setup.
            fn setup() -> (std::path::PathBuf, crate::index::VoteIndex) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["ballot_index"],
                    None,
                    None,
                );
                let random: u32 = rand::random();
                let dir = std::env::temp_dir().join(format!("ballot-index-test{random}"));
                let index = crate::index::VoteIndex::read_or_create(
                    dir.join("index.json"),
                    crate::persistence::FileStore,
                )
                .unwrap();

                #maybe_seed

                (dir, index)
            }

            /// The test itself.
            #item_fn

            let (dir, index) = setup();

            // Run the test, catching any panics.
            let test_dir = dir.clone();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
                let dir = test_dir;
                #new_name(#(#test_args),*);
            }));

            // Run the cleanup. The directory only exists once something was saved.
            if dir.exists() {
                std::fs::remove_dir_all(&dir).unwrap();
            }

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is synchronous, extract parameters to inject, and
/// reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if let Some(asyncness) = sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "Test must not be `async`; the vote index is synchronous",
        ));
    }

    let mut has_index = false;
    let mut has_dir = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself.
                let type_ident = &type_path.path.segments.last().unwrap().ident;
                if type_ident == "VoteIndex" {
                    if has_index {
                        return Err(syn::Error::new(
                            input.span(),
                            "Test cannot accept more than one `VoteIndex`",
                        ));
                    }
                    has_index = true;
                    args.push(quote! { index });
                    continue;
                } else if type_ident == "PathBuf" {
                    if has_dir {
                        return Err(syn::Error::new(
                            input.span(),
                            "Test cannot accept more than one `PathBuf`",
                        ));
                    }
                    has_dir = true;
                    args.push(quote! { dir });
                    continue;
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `index_ident: VoteIndex` or `dir_ident: PathBuf`",
        ));
    }

    Ok(args)
}
