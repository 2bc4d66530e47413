use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one running against a
/// fresh in-memory store, and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// `crate::store::Repo` and `crate::notify::recording::Outbox`.
///
/// Pass `admin`, `voter` or `witness` to have the client logged in as the
/// matching example user before the test starts.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Log in the client if needed.
    let login_as = match parse_macro_input!(args as Option<Ident>) {
        None => None,
        Some(arg) if arg == "admin" => Some(quote! { example_admin() }),
        Some(arg) if arg == "voter" => Some(quote! { example_voter() }),
        Some(arg) if arg == "witness" => Some(quote! { example_witness(1) }),
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected one of `admin`, `voter` or `witness`")
                .into_compile_error()
                .into();
        }
    };
    let maybe_login = login_as
        .map(|constructor| {
            quote! {
                // Scoped so the response is dropped before the client moves.
                {
                    let user = crate::model::db::user::UserCore::#constructor;
                    let credentials = crate::model::api::auth::Credentials {
                        email: user.email.clone(),
                        password: crate::model::db::user::examples::EXAMPLE_PASSWORD.to_string(),
                    };
                    crate::store::Store::insert_user(&*repo, user).await.unwrap();

                    let response = rocket_client
                        .post(uri!(crate::api::auth::login))
                        .header(rocket::http::ContentType::JSON)
                        .body(rocket::serde::json::to_string(&credentials).unwrap())
                        .dispatch()
                        .await;
                    assert_eq!(response.status(), rocket::http::Status::Ok);
                }
            }
        })
        .unwrap_or_default();

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::store::Repo,
                crate::notify::recording::Outbox,
            ) {
                let repo = crate::store::Repo::new(crate::store::MemoryStore::new());
                let notifier = crate::notify::recording::RecordingNotifier::new();
                let outbox = notifier.outbox.clone();
                let postman = crate::notify::Postman::new(notifier);
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_store(repo.clone(), postman),
                )
                .await
                .unwrap();

                #maybe_login

                (rocket_client, repo, outbox)
            }

            /// The test itself.
            #item_fn

            // This test enters the whole server, so enable logging.
            log4rs_test_utils::test_logging::init_logging_once_for(["evote_backend"], None, None);

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, repo, outbox) = setup().await;
                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut args = vec![];
    let mut seen: Vec<String> = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself.
                if let Some(segment) = type_path.path.segments.last() {
                    let injected = match segment.ident.to_string().as_str() {
                        "Client" => Some(quote! { rocket_client }),
                        "Repo" => Some(quote! { repo.clone() }),
                        "Outbox" => Some(quote! { outbox.clone() }),
                        _ => None,
                    };
                    if let Some(injected) = injected {
                        let type_name = segment.ident.to_string();
                        if seen.contains(&type_name) {
                            return Err(syn::Error::new(
                                input.span(),
                                format!("Test cannot accept more than one `{type_name}`"),
                            ));
                        }
                        seen.push(type_name);
                        args.push(injected);
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `repo_ident: Repo` or `outbox_ident: Outbox`",
        ));
    }

    Ok(args)
}
