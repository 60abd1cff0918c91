use {
    chunkcrypt::cli::{Cli, Command},
    chunkcrypt_protocol::AccessToken,
    chunkcrypt_sdk::{
        Client, Error, Passphrase, SourceFile, TransferOptions, download_file, list_files,
        remove_file, upload_file,
    },
    chunkcrypt_tests::{TestServer, random_content},
};

const CHUNK_SIZE: usize = 64 * 1024;

fn options() -> TransferOptions {
    TransferOptions {
        chunk_size: CHUNK_SIZE,
        ..TransferOptions::default()
    }
}

fn passphrase(value: &str) -> Passphrase {
    Passphrase::new(value).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn round_trip_over_http() {
    let server = TestServer::start().await.unwrap();
    let client = server.client().unwrap();
    let data: Vec<u8> = (0..CHUNK_SIZE * 3 + 1000).map(|i| (i % 251) as u8).collect();

    let report = upload_file(
        &client,
        SourceFile::new("data.bin", data.clone()),
        &passphrase("p1"),
        &options(),
    )
    .await
    .unwrap();
    assert_eq!(report.chunks.len(), 4);
    assert_eq!(report.original_size, data.len() as u64);
    assert_eq!(report.stored_size, data.len() as u64 + 4 * 44);

    let files = list_files(&client, &options()).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "data.bin");
    assert_eq!(files[0].object_count, 4);
    assert_eq!(files[0].total_size, report.stored_size);

    let downloaded = download_file(&client, "data.bin", &passphrase("p1"), &options())
        .await
        .unwrap();
    assert_eq!(downloaded, data);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_and_missing_names() {
    let server = TestServer::start().await.unwrap();
    let client = server.client().unwrap();
    let file = SourceFile::new("notes.txt", b"hello".to_vec());

    upload_file(&client, file.clone(), &passphrase("p1"), &options())
        .await
        .unwrap();
    let err = upload_file(&client, file, &passphrase("p1"), &options())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateContainer(_)), "{err:?}");

    let err = download_file(&client, "other.txt", &passphrase("p1"), &options())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{err:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_passphrase_over_http() {
    let server = TestServer::start().await.unwrap();
    let client = server.client().unwrap();
    upload_file(
        &client,
        SourceFile::new("secret.txt", vec![1; 3 * CHUNK_SIZE]),
        &passphrase("p1"),
        &options(),
    )
    .await
    .unwrap();

    let err = download_file(&client, "secret.txt", &passphrase("p2"), &options())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication), "{err:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_unknown_token() {
    let server = TestServer::start().await.unwrap();
    let client = Client::new(server.url.clone(), AccessToken::generate().unwrap()).unwrap();
    let err = list_files(&client, &options()).await.unwrap_err();
    assert!(matches!(err, Error::Store(_)), "{err:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn remove_deletes_objects() {
    let server = TestServer::start().await.unwrap();
    let client = server.client().unwrap();
    upload_file(
        &client,
        SourceFile::new("tmp.bin", vec![7; CHUNK_SIZE * 2]),
        &passphrase("p1"),
        &options(),
    )
    .await
    .unwrap();

    remove_file(&client, "tmp.bin", &options()).await.unwrap();
    assert!(list_files(&client, &options()).await.unwrap().is_empty());
    let err = remove_file(&client, "tmp.bin", &options()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{err:?}");
    let objects = fs_err::read_dir(server.storage_path.join("objects"))
        .unwrap()
        .count();
    assert_eq!(objects, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn command_line_round_trip() {
    let server = TestServer::start().await.unwrap();
    let passphrase_file = server.passphrase_file("correct horse").unwrap();
    let local_dir = server.dir.path().join("local");
    fs_err::create_dir_all(&local_dir).unwrap();
    let source = local_dir.join("report.pdf");
    let mut data = random_content(5 * CHUNK_SIZE);
    data.extend_from_slice(b"trailer");
    fs_err::write(&source, &data).unwrap();

    let cli = |command| Cli {
        config: None,
        passphrase_file: Some(passphrase_file.clone()),
        command,
    };
    let config = || server.client_config(CHUNK_SIZE as u64);

    chunkcrypt::run(
        cli(Command::Upload {
            path: source.clone(),
            name: None,
        }),
        config(),
    )
    .await
    .unwrap();
    chunkcrypt::run(cli(Command::Ls), config()).await.unwrap();

    let target = local_dir.join("copy.pdf");
    chunkcrypt::run(
        cli(Command::Download {
            name: "report.pdf".into(),
            path: target.clone(),
        }),
        config(),
    )
    .await
    .unwrap();
    assert_eq!(fs_err::read(&target).unwrap(), data);

    // The target now exists and is left untouched.
    chunkcrypt::run(
        cli(Command::Download {
            name: "report.pdf".into(),
            path: target.clone(),
        }),
        config(),
    )
    .await
    .unwrap_err();

    chunkcrypt::run(
        cli(Command::Remove {
            name: "report.pdf".into(),
            yes: true,
        }),
        config(),
    )
    .await
    .unwrap();
    let files = list_files(&server.client().unwrap(), &options())
        .await
        .unwrap();
    assert!(files.is_empty());
}
