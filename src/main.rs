use fieldsync_lib::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fieldsync_lib::init_logging();
    fieldsync_lib::run(AppConfig::from_env()).await
}
