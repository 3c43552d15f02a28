//! Example declaring a small service and calling it through deferred values.
//!
//! This example shows how to:
//! - Declare a service as a set of method descriptors
//! - Build it over the reqwest transport with a JSON converter
//! - Await deferred values and cancel one that takes too long
//!
//! Run with: `cargo run --example hello_service`

use retrofit_reqwest::{
    Args, Deferred, Dispatcher, Error, JsonConverterFactory, MethodDescriptor, ReqwestTransport,
    Service,
};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

struct PostService {
    dispatcher: Dispatcher,
}

impl Service for PostService {
    const NAME: &'static str = "PostService";

    fn methods() -> Vec<MethodDescriptor> {
        vec![
            MethodDescriptor::get("post", "posts/{id}").path_param("id"),
            MethodDescriptor::get("posts_by_user", "posts").query("userId"),
        ]
    }

    fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

impl PostService {
    fn post(&self, id: u32) -> retrofit_reqwest::Result<Deferred<Post>> {
        self.dispatcher.invoke("post", Args::new().path("id", id))
    }

    fn posts_by_user(&self, user_id: u32) -> retrofit_reqwest::Result<Deferred<Vec<Post>>> {
        self.dispatcher
            .invoke("posts_by_user", Args::new().query("userId", user_id))
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("retrofit_reqwest=debug,hello_service=info")
        .init();

    let transport = ReqwestTransport::builder()
        .default_header("User-Agent", "hello-service-demo/0.1")?
        .build()?;

    let service: PostService = retrofit_reqwest::builder(transport)
        .uri("https://jsonplaceholder.typicode.com/")
        .configure(|builder| {
            builder.add_converter_factory(JsonConverterFactory::create());
            Ok(())
        })
        .build()?;

    println!("=== Deferred GET ===");
    let post = service.post(1)?.await?;
    println!("Post {}: {}", post.id, post.title);
    println!();

    println!("=== Deferred GET with query ===");
    let posts = service.posts_by_user(1)?.await?;
    println!("User 1 wrote {} posts", posts.len());
    println!();

    println!("=== Cancelling a slow request ===");
    let deferred = service.post(2)?;
    let handle = deferred.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.cancel();
    });
    match deferred.await {
        Ok(post) => println!("Finished before the cancel: {}", post.title),
        Err(Error::Cancelled) => println!("Cancelled"),
        Err(e) => return Err(e),
    }

    Ok(())
}
