use schoolgraph::domain::models::{CreateSchoolInput, CreateStudentInput};
use schoolgraph::domain::{resolve, MemoryStore, RequestContext, ServiceResult};
use schoolgraph::ServiceConfig;
use tracing_subscriber::EnvFilter;

// Seeds an in-memory store, then resolves schools with their students in a fresh request.
// Run with `RUST_LOG=schoolgraph=debug` to watch the loaders batch their keys.
#[tokio::main]
async fn main() -> ServiceResult<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = ServiceConfig::from_env();
    let store = MemoryStore::new_shared();

    let setup = RequestContext::new(store.clone(), &config);
    for (name, pupils) in [("Hillside", 3), ("Riverside", 1), ("Lakeside", 0)] {
        let school = setup
            .schools()
            .create(CreateSchoolInput { name: name.to_owned(), address: None })
            .await?;
        for n in 0..pupils {
            setup
                .students()
                .create(CreateStudentInput {
                    first_name: format!("Pupil{n}"),
                    last_name: name.to_owned(),
                    email: format!("pupil{n}@{}.test", name.to_lowercase()),
                    date_of_birth: None,
                    school_id: school.id.clone(),
                })
                .await?;
        }
    }
    drop(setup);

    let ctx = RequestContext::new(store.clone(), &config);
    let before = store.bulk_queries();
    for node in resolve::schools_with_students(&ctx).await? {
        println!("{}: {} students", node.school.name, node.students.len());
    }
    println!("bulk reads: {}", store.bulk_queries() - before);
    Ok(())
}
