fn main() -> anyhow::Result<()> {
    weatherface_lib::run()
}
