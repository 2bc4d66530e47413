use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn, Pat, Signature, Type};

/// Run an asynchronous test against a [`crate::store::MongoStore`] on a fresh,
/// uniquely named database, and drop that database WHETHER OR NOT the test
/// completes by passing, failing or otherwise panicking.
///
/// The server is named by the `EVOTE_TEST_DB_URI` environment variable and
/// must be a replica set, since the store uses transactions. When the
/// variable is unset the test is skipped with a notice on stderr.
#[proc_macro_attribute]
pub fn db_test(_: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);
    if let Err(err) = check_sig(item_fn.sig.clone()) {
        return err.into_compile_error().into();
    }

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    quote! {
        #[test]
        fn #name() {
            /// The test itself.
            #item_fn

            // Separate runtimes for inside and outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("db-test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("db-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            let store = match outer_runtime.block_on(crate::store::MongoStore::for_test()) {
                Some(store) => store,
                None => {
                    eprintln!(
                        "skipping {}: {} is not set",
                        stringify!(#name),
                        crate::store::MongoStore::TEST_DB_URI_VAR,
                    );
                    return;
                }
            };

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let store_mutex = std::sync::Mutex::new(store.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let store = store_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();
                runtime.block_on(#new_name(store));
            });

            outer_runtime.block_on(store.drop_database());

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async and takes exactly one `MongoStore`.
fn check_sig(sig: Signature) -> Result<(), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let inputs = &sig.inputs;
    if inputs.len() != 1 {
        return Err(syn::Error::new(
            inputs.span(),
            "Test must accept exactly one `MongoStore`",
        ));
    }

    for input in inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself.
                if let Some(segment) = type_path.path.segments.last() {
                    if segment.ident == "MongoStore" {
                        continue;
                    }
                }
            }
        }
        return Err(syn::Error::new(
            input.span(),
            "Expected `store_ident: MongoStore`",
        ));
    }

    Ok(())
}
