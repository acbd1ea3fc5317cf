//! End-to-end tests: compile fixture applications from a real directory
//! tree, both through the library pipeline and the CLI binary.

use girderc::pipeline::{self, CancelToken, PipelineParams};
use girderc::util::OsFiles;

use assert_cmd::Command;

use std::fs;
use std::path::Path;

fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn write_blog_app(root: &Path) {
    write_file(
        root,
        "blog/api.rs",
        "// Lists all posts.\n\
         //girder:api public method=GET path=/blog tag:cache\n\
         fn list(ctx: Context) -> Result<PostList, Error> { todo!() }\n\
         \n\
         //girder:api public method=GET path=/blog/:id\n\
         fn get(ctx: Context, id: u64) -> Result<Post, Error> { todo!() }\n\
         \n\
         //girder:middleware target=tag:cache\n\
         fn cache(req: Request, next: Next) -> Response { todo!() }\n\
         \n\
         struct PostList { posts: Vec<String> }\n\
         struct Post { id: u64 }\n",
    );
    write_file(
        root,
        "user/auth.rs",
        "//girder:authhandler\n\
         fn auth(ctx: Context, token: String) -> Result<UserID, Error> { todo!() }\n\
         \n\
         //girder:api auth method=POST path=/signup\n\
         fn signup(ctx: Context, params: SignupParams) -> Result<(), Error> { todo!() }\n\
         \n\
         struct SignupParams { email: String }\n",
    );
}

#[test]
fn pipeline_compiles_an_app_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_blog_app(dir.path());

    let params = PipelineParams {
        app_root: dir.path(),
        source: &OsFiles,
        cancel: CancelToken::new(),
    };
    let output = pipeline::run(&params).unwrap();
    assert!(
        output.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        output.diagnostics
    );

    let names: Vec<&str> = output
        .desc
        .services
        .iter()
        .map(|svc| svc.name.as_str())
        .collect();
    assert_eq!(names, vec!["blog", "user"]);
    assert!(output.desc.auth_handler.is_some());

    // The cache middleware applies to the tagged endpoint only.
    let blog = &output.desc.services[0];
    let tagged = &blog.endpoints[0];
    let untagged = &blog.endpoints[1];
    assert_eq!(
        output.desc.matching_middleware(blog, tagged).len(),
        1
    );
    assert!(output
        .desc
        .matching_middleware(blog, untagged)
        .is_empty());

    assert!(!output.overlays.is_empty());
}

#[test]
fn check_reports_duplicate_paths() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "blog/api.rs",
        "//girder:api public method=POST path=/foo\n\
         fn a(ctx: Context) -> Result<(), Error> { todo!() }\n\
         \n\
         //girder:api public method=POST path=/foo\n\
         fn b(ctx: Context) -> Result<(), Error> { todo!() }\n",
    );

    let assert = Command::cargo_bin("girderc")
        .unwrap()
        .args([
            "--app-root",
            dir.path().to_str().unwrap(),
            "--charset",
            "ascii",
            "--no-color",
            "check",
        ])
        .assert()
        .failure();

    let stderr =
        String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("duplicate path"), "stderr: {}", stderr);
    assert!(stderr.contains("/foo"));
}

#[test]
fn check_succeeds_on_a_clean_app() {
    let dir = tempfile::tempdir().unwrap();
    write_blog_app(dir.path());

    Command::cargo_bin("girderc")
        .unwrap()
        .args([
            "--app-root",
            dir.path().to_str().unwrap(),
            "--no-color",
            "check",
        ])
        .assert()
        .success();
}

#[test]
fn meta_prints_the_descriptor_as_json() {
    let dir = tempfile::tempdir().unwrap();
    write_blog_app(dir.path());

    let assert = Command::cargo_bin("girderc")
        .unwrap()
        .args([
            "--app-root",
            dir.path().to_str().unwrap(),
            "--no-color",
            "meta",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let meta: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(meta["services"][0]["name"], "blog");
    assert_eq!(meta["services"][0]["num"], 1);
    assert_eq!(meta["auth_handler"]["token_param"], true);
    assert_eq!(
        meta["services"][0]["endpoints"][0]["path"]["segments"][0]["value"],
        "blog"
    );

    // Overlays are reported in stable key order, the injected main first.
    let overlays = meta["overlays"].as_array().unwrap();
    assert_eq!(overlays[0]["source_path"], "girder_main.rs");
    assert!(overlays
        .iter()
        .any(|o| o["source_path"] == "blog/girder_gen_api.rs"));
    assert!(overlays.iter().all(|o| o["bytes"].as_u64().unwrap() > 0));
}

#[test]
fn gen_writes_overlays_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_blog_app(dir.path());
    let out = tempfile::tempdir().unwrap();

    Command::cargo_bin("girderc")
        .unwrap()
        .args([
            "--app-root",
            dir.path().to_str().unwrap(),
            "--no-color",
            "gen",
            "--out",
            out.path().to_str().unwrap(),
        ])
        .assert()
        .success();

    let generated = out.path().join("blog/girder_gen_api.rs");
    let text = fs::read_to_string(generated).unwrap();
    assert!(text.starts_with("// Code generated by girderc."));
    assert!(text.contains("\"/blog/:id\""));
}
